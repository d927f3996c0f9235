//! # Stock Movement Repository
//!
//! The stock ledger. Every change to `products.stock` has exactly one row
//! here, written on the same transaction as the product update.
//!
//! ## Reconciliation
//! ```text
//! product.stock == SUM(stock_movements.change WHERE product_id = ?)
//!
//! initial_stock  +10
//! sale            -3   (sale_id)
//! return          +1   (sale_id, return_id)
//! purchase       +24
//! ─────────────────────
//! stock           32
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::DbResult;
use crate::repository::generate_id;
use tillpoint_core::{CoreError, StockMovement, StockReason};

const MOVEMENT_COLUMNS: &str =
    "id, product_id, branch_id, change, reason, sale_id, return_id, note, created_at";

/// A movement about to be written.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MovementInsert<'a> {
    pub product_id: &'a str,
    pub branch_id: &'a str,
    pub change: i64,
    pub reason: StockReason,
    pub sale_id: Option<&'a str>,
    pub return_id: Option<&'a str>,
    pub note: Option<&'a str>,
}

/// Cached stock compared against the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReconciliation {
    pub product_stock: i64,
    pub movement_total: i64,
    pub in_sync: bool,
}

#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockMovement>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::find_tx(&mut conn, id).await?)
    }

    /// A product's movements, oldest first.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = ?1 ORDER BY created_at, rowid"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Movements written by a sale and by the returns against it.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE sale_id = ?1 ORDER BY created_at, rowid"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Sum of a product's movements.
    pub async fn movement_total(&self, product_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::movement_total_tx(&mut conn, product_id).await?)
    }

    /// Compares a product's cached stock with its ledger.
    pub async fn reconcile(&self, product_id: &str) -> DbResult<StockReconciliation> {
        let mut conn = self.pool.acquire().await?;

        let product_stock: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;
        let product_stock =
            product_stock.ok_or_else(|| CoreError::not_found("product", product_id))?;

        let movement_total = Self::movement_total_tx(&mut conn, product_id).await?;
        let in_sync = product_stock == movement_total;

        if !in_sync {
            warn!(
                product_id = %product_id,
                product_stock = product_stock,
                movement_total = movement_total,
                "Stock out of sync with movements"
            );
        }

        Ok(StockReconciliation {
            product_stock,
            movement_total,
            in_sync,
        })
    }

    pub(crate) async fn insert_tx(
        conn: &mut SqliteConnection,
        movement: MovementInsert<'_>,
    ) -> DbResult<StockMovement> {
        debug!(
            product_id = %movement.product_id,
            change = movement.change,
            reason = ?movement.reason,
            "Recording stock movement"
        );

        let row = StockMovement {
            id: generate_id(),
            product_id: movement.product_id.to_string(),
            branch_id: movement.branch_id.to_string(),
            change: movement.change,
            reason: movement.reason,
            sale_id: movement.sale_id.map(str::to_string),
            return_id: movement.return_id.map(str::to_string),
            note: movement.note.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, branch_id, change, reason,
                sale_id, return_id, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&row.id)
        .bind(&row.product_id)
        .bind(&row.branch_id)
        .bind(row.change)
        .bind(row.reason)
        .bind(&row.sale_id)
        .bind(&row.return_id)
        .bind(&row.note)
        .bind(row.created_at)
        .execute(conn)
        .await?;

        Ok(row)
    }

    pub(crate) async fn find_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<StockMovement>, sqlx::Error> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE id = ?1");
        sqlx::query_as::<_, StockMovement>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub(crate) async fn delete_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM stock_movements WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("stock movement", id).into());
        }
        Ok(())
    }

    /// Restock movements written by one return.
    pub(crate) async fn for_return_tx(
        conn: &mut SqliteConnection,
        return_id: &str,
    ) -> Result<Vec<StockMovement>, sqlx::Error> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE return_id = ?1 ORDER BY rowid"
        );
        sqlx::query_as::<_, StockMovement>(&sql)
            .bind(return_id)
            .fetch_all(conn)
            .await
    }

    /// Units of `product_id` already put back into stock by returns on
    /// `sale_id`.
    pub(crate) async fn restocked_quantity_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
        product_id: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(change), 0)
            FROM stock_movements
            WHERE sale_id = ?1 AND product_id = ?2 AND reason = 'return'
            "#,
        )
        .bind(sale_id)
        .bind(product_id)
        .fetch_one(conn)
        .await
    }

    pub(crate) async fn movement_total_tx(
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(change), 0) FROM stock_movements WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_catalog, test_db};

    #[tokio::test]
    async fn test_new_product_is_in_sync() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let report = db
            .stock_movements()
            .reconcile(&catalog.cola.id)
            .await
            .unwrap();
        assert!(report.in_sync);
        assert_eq!(report.product_stock, catalog.cola.stock);

        let movements = db
            .stock_movements()
            .list_for_product(&catalog.cola.id)
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].reason, StockReason::InitialStock);
    }

    #[tokio::test]
    async fn test_bare_stock_write_is_detected() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        sqlx::query("UPDATE products SET stock = stock + 5 WHERE id = ?1")
            .bind(&catalog.cola.id)
            .execute(db.pool())
            .await
            .unwrap();

        let report = db
            .stock_movements()
            .reconcile(&catalog.cola.id)
            .await
            .unwrap();
        assert!(!report.in_sync);
        assert_eq!(report.product_stock - report.movement_total, 5);
    }

    #[tokio::test]
    async fn test_reconcile_unknown_product() {
        let db = test_db().await;
        let err = db.stock_movements().reconcile("ghost").await.unwrap_err();
        assert_eq!(err.kind(), tillpoint_core::ErrorKind::NotFound);
    }
}
