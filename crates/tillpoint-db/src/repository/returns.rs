//! # Return Repository
//!
//! Returns recorded against sales. The sum of a sale's returns is the
//! source of truth for its `refunded_cents`.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::generate_id;
use tillpoint_core::{CoreError, Money, ReturnReason, SaleReturn};

const RETURN_COLUMNS: &str =
    "id, sale_id, amount_cents, reason, processed_by, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SaleReturn>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::find_tx(&mut conn, id).await?)
    }

    /// A sale's returns, oldest first.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<SaleReturn>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::list_for_sale_tx(&mut conn, sale_id).await?)
    }

    pub(crate) async fn find_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<SaleReturn>, sqlx::Error> {
        let sql = format!("SELECT {RETURN_COLUMNS} FROM returns WHERE id = ?1");
        sqlx::query_as::<_, SaleReturn>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub(crate) async fn require_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<SaleReturn> {
        let row = Self::find_tx(conn, id).await?;
        Ok(row.ok_or_else(|| CoreError::not_found("return", id))?)
    }

    pub(crate) async fn list_for_sale_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> Result<Vec<SaleReturn>, sqlx::Error> {
        let sql = format!(
            "SELECT {RETURN_COLUMNS} FROM returns WHERE sale_id = ?1 ORDER BY created_at, rowid"
        );
        sqlx::query_as::<_, SaleReturn>(&sql)
            .bind(sale_id)
            .fetch_all(conn)
            .await
    }

    /// Amounts of a sale's returns, optionally leaving one out.
    pub(crate) async fn amounts_for_sale_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
        excluding: Option<&str>,
    ) -> Result<Vec<Money>, sqlx::Error> {
        let amounts: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT amount_cents FROM returns
            WHERE sale_id = ?1 AND (?2 IS NULL OR id <> ?2)
            ORDER BY rowid
            "#,
        )
        .bind(sale_id)
        .bind(excluding)
        .fetch_all(conn)
        .await?;

        Ok(amounts.into_iter().map(Money::from_cents).collect())
    }

    pub(crate) async fn insert_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
        amount: Money,
        reason: Option<ReturnReason>,
        processed_by: Option<&str>,
    ) -> DbResult<SaleReturn> {
        debug!(sale_id = %sale_id, amount = amount.cents(), "Inserting return");

        let now = Utc::now();
        let row = SaleReturn {
            id: generate_id(),
            sale_id: sale_id.to_string(),
            amount_cents: amount.cents(),
            reason,
            processed_by: processed_by.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO returns (id, sale_id, amount_cents, reason, processed_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&row.id)
        .bind(&row.sale_id)
        .bind(row.amount_cents)
        .bind(row.reason)
        .bind(&row.processed_by)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(conn)
        .await?;

        Ok(row)
    }

    pub(crate) async fn update_tx(
        conn: &mut SqliteConnection,
        id: &str,
        amount: Money,
        reason: Option<ReturnReason>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE returns SET amount_cents = ?2, reason = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(amount.cents())
        .bind(reason)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("return", id).into());
        }
        Ok(())
    }

    pub(crate) async fn delete_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM returns WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("return", id).into());
        }
        Ok(())
    }
}
