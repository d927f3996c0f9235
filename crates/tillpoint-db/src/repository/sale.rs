//! # Sale Repository
//!
//! Database operations for sales, sale lines and payments.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sale States                                     │
//! │                                                                         │
//! │  ┌─────────┐  checkout tx   ┌───────────┐  return  ┌──────────────────┐ │
//! │  │ PENDING │ ─────────────► │ COMPLETED │ ───────► │PARTIALLY_REFUNDED│ │
//! │  └─────────┘   (commit)     └───────────┘          └────────┬─────────┘ │
//! │   never visible                  │                          │ return    │
//! │   outside the tx                 │ cancel (admin)           ▼           │
//! │                                  ▼                    ┌──────────┐      │
//! │                            ┌───────────┐              │ REFUNDED │      │
//! │                            │ CANCELLED │              └──────────┘      │
//! │                            └───────────┘                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `refunded_cents` and `status` are only ever written together by
//! [`SaleRepository::set_refund_state_tx`], guarded on the value read at
//! the start of the transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::generate_id;
use crate::repository::returns::ReturnRepository;
use tillpoint_core::refund::RefundSummary;
use tillpoint_core::{CoreError, Payment, PaymentMethod, Sale, SaleLine, SaleReturn, SaleStatus};

const SALE_COLUMNS: &str = r#"
    id, branch_id, cashier_id, customer_id, receipt_number,
    total_gross_cents, total_net_cents, total_tax_cents, total_discount_cents,
    refunded_cents, status, loyalty_points_earned, loyalty_points_used,
    metadata, created_at, updated_at
"#;

const LINE_COLUMNS: &str = r#"
    id, sale_id, product_id, name_snapshot, unit_price_cents, quantity,
    discount_cents, tax_cents, line_total_cents, promotion_id, created_at
"#;

/// A sale with everything written alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetails {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
    pub payments: Vec<Payment>,
    pub returns: Vec<SaleReturn>,
}

/// `sales` row as stored; metadata is JSON text.
#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    branch_id: String,
    cashier_id: Option<String>,
    customer_id: Option<String>,
    receipt_number: String,
    total_gross_cents: i64,
    total_net_cents: i64,
    total_tax_cents: i64,
    total_discount_cents: i64,
    refunded_cents: i64,
    status: SaleStatus,
    loyalty_points_earned: i64,
    loyalty_points_used: i64,
    metadata: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SaleRow> for Sale {
    type Error = DbError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        let metadata = row
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| DbError::CorruptColumn {
                column: "sales.metadata".to_string(),
                message: e.to_string(),
            })?;

        Ok(Sale {
            id: row.id,
            branch_id: row.branch_id,
            cashier_id: row.cashier_id,
            customer_id: row.customer_id,
            receipt_number: row.receipt_number,
            total_gross_cents: row.total_gross_cents,
            total_net_cents: row.total_net_cents,
            total_tax_cents: row.total_tax_cents,
            total_discount_cents: row.total_discount_cents,
            refunded_cents: row.refunded_cents,
            status: row.status,
            loyalty_points_earned: row.loyalty_points_earned,
            loyalty_points_used: row.loyalty_points_used,
            metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A payment about to be written.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PaymentInsert<'a> {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub reference: Option<&'a str>,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_tx(&mut conn, id).await
    }

    pub async fn get_by_receipt(&self, receipt_number: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE receipt_number = ?1");
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(receipt_number)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Sale::try_from).transpose()
    }

    /// The sale with its lines, payments and returns.
    pub async fn get_details(&self, id: &str) -> DbResult<SaleDetails> {
        let mut conn = self.pool.acquire().await?;
        Self::details_tx(&mut conn, id).await
    }

    /// Gets all lines for a sale.
    pub async fn lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::lines_tx(&mut conn, sale_id).await?)
    }

    /// Gets all payments for a sale.
    pub async fn payments(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::payments_tx(&mut conn, sale_id).await?)
    }

    /// Counts committed sales (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Cancels a completed sale with no returns.
    ///
    /// Administrative: stock and loyalty are not touched. The sale's stock
    /// decrements and `sale` movements stay in place; if goods physically
    /// come back, record them with
    /// [`StockService::record_movement`](crate::service::stock::StockService::record_movement)
    /// (reason `adjustment`). Returns are refused on cancelled sales, so a
    /// refund with restock is not available afterwards.
    pub async fn cancel(&self, id: &str) -> DbResult<Sale> {
        let mut tx = begin_write(&self.pool).await?;

        let result = sqlx::query(
            r#"
            UPDATE sales SET status = ?2, updated_at = ?3
            WHERE id = ?1 AND status = ?4 AND refunded_cents = 0
            "#,
        )
        .bind(id)
        .bind(SaleStatus::Cancelled)
        .bind(Utc::now())
        .bind(SaleStatus::Completed)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match Self::find_tx(&mut tx, id).await? {
                None => CoreError::not_found("sale", id),
                Some(sale) if sale.status == SaleStatus::Cancelled => CoreError::SaleCancelled {
                    sale_id: id.to_string(),
                },
                Some(_) => CoreError::Conflict {
                    entity: "sale",
                    id: id.to_string(),
                },
            }
            .into());
        }

        let sale = Self::require_tx(&mut tx, id).await?;
        tx.commit().await?;

        info!(sale_id = %id, receipt = %sale.receipt_number, "Sale cancelled");
        Ok(sale)
    }

    pub(crate) async fn find_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        row.map(Sale::try_from).transpose()
    }

    pub(crate) async fn require_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
        Self::find_tx(conn, id)
            .await?
            .ok_or_else(|| CoreError::not_found("sale", id).into())
    }

    pub(crate) async fn details_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<SaleDetails> {
        let sale = Self::require_tx(&mut *conn, id).await?;
        let lines = Self::lines_tx(&mut *conn, id).await?;
        let payments = Self::payments_tx(&mut *conn, id).await?;
        let returns = ReturnRepository::list_for_sale_tx(&mut *conn, id).await?;

        Ok(SaleDetails {
            sale,
            lines,
            payments,
            returns,
        })
    }

    /// Inserts the sale row. Checkout inserts it as PENDING and flips it to
    /// COMPLETED as the last write of the transaction.
    pub(crate) async fn insert_tx(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, receipt = %sale.receipt_number, "Inserting sale");

        let metadata = sale
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, branch_id, cashier_id, customer_id, receipt_number,
                total_gross_cents, total_net_cents, total_tax_cents, total_discount_cents,
                refunded_cents, status, loyalty_points_earned, loyalty_points_used,
                metadata, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.branch_id)
        .bind(&sale.cashier_id)
        .bind(&sale.customer_id)
        .bind(&sale.receipt_number)
        .bind(sale.total_gross_cents)
        .bind(sale.total_net_cents)
        .bind(sale.total_tax_cents)
        .bind(sale.total_discount_cents)
        .bind(sale.refunded_cents)
        .bind(sale.status)
        .bind(sale.loyalty_points_earned)
        .bind(sale.loyalty_points_used)
        .bind(metadata)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub(crate) async fn insert_line_tx(conn: &mut SqliteConnection, line: &SaleLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, product_id, name_snapshot, unit_price_cents, quantity,
                discount_cents, tax_cents, line_total_cents, promotion_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.product_id)
        .bind(&line.name_snapshot)
        .bind(line.unit_price_cents)
        .bind(line.quantity)
        .bind(line.discount_cents)
        .bind(line.tax_cents)
        .bind(line.line_total_cents)
        .bind(&line.promotion_id)
        .bind(line.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub(crate) async fn insert_payment_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
        payment: PaymentInsert<'_>,
    ) -> DbResult<Payment> {
        debug!(sale_id = %sale_id, amount = payment.amount_cents, "Recording payment");

        let row = Payment {
            id: generate_id(),
            sale_id: sale_id.to_string(),
            method: payment.method,
            amount_cents: payment.amount_cents,
            reference: payment.reference.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO payments (id, sale_id, method, amount_cents, reference, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&row.id)
        .bind(&row.sale_id)
        .bind(row.method)
        .bind(row.amount_cents)
        .bind(&row.reference)
        .bind(row.created_at)
        .execute(conn)
        .await?;

        Ok(row)
    }

    /// PENDING → COMPLETED.
    pub(crate) async fn mark_completed_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sales SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(id)
        .bind(SaleStatus::Completed)
        .bind(Utc::now())
        .bind(SaleStatus::Pending)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                entity: "sale",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Writes a recomputed refund summary.
    ///
    /// The update only lands if `refunded_cents` still holds `expected`,
    /// the value the summary was computed from; otherwise another writer
    /// got there first and the caller's transaction must roll back.
    pub(crate) async fn set_refund_state_tx(
        conn: &mut SqliteConnection,
        id: &str,
        expected_refunded: i64,
        summary: RefundSummary,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET refunded_cents = ?2, status = ?3, updated_at = ?4
            WHERE id = ?1 AND refunded_cents = ?5 AND status <> ?6
            "#,
        )
        .bind(id)
        .bind(summary.refunded.cents())
        .bind(summary.status)
        .bind(Utc::now())
        .bind(expected_refunded)
        .bind(SaleStatus::Cancelled)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                entity: "sale",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Units of `product_id` sold on `sale_id`.
    pub(crate) async fn quantity_sold_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
        product_id: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM sale_lines WHERE sale_id = ?1 AND product_id = ?2",
        )
        .bind(sale_id)
        .bind(product_id)
        .fetch_one(conn)
        .await
    }

    pub(crate) async fn lines_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> Result<Vec<SaleLine>, sqlx::Error> {
        let sql = format!("SELECT {LINE_COLUMNS} FROM sale_lines WHERE sale_id = ?1 ORDER BY rowid");
        sqlx::query_as::<_, SaleLine>(&sql)
            .bind(sale_id)
            .fetch_all(conn)
            .await
    }

    pub(crate) async fn payments_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> Result<Vec<Payment>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, sale_id, method, amount_cents, reference, created_at
            FROM payments
            WHERE sale_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::stock::NewMovement;
    use crate::test_support::{seed_catalog, simple_checkout, test_db};
    use tillpoint_core::{ErrorKind, StockReason};

    #[tokio::test]
    async fn test_details_roundtrip_metadata() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let mut request = simple_checkout(&catalog, 2);
        request.metadata = Some(serde_json::json!({ "till": 3, "note": "window seat" }));
        let details = db.checkout().checkout(request).await.unwrap();

        let loaded = db.sales().get_details(&details.sale.id).await.unwrap();
        assert_eq!(loaded, details);
        assert_eq!(loaded.sale.metadata.unwrap()["till"], 3);

        let by_receipt = db
            .sales()
            .get_by_receipt(&details.sale.receipt_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_receipt.id, details.sale.id);
    }

    #[tokio::test]
    async fn test_missing_sale_is_not_found() {
        let db = test_db().await;
        let err = db.sales().get_details("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_cancel_only_untouched_completed_sales() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;
        let details = db
            .checkout()
            .checkout(simple_checkout(&catalog, 1))
            .await
            .unwrap();

        let sale = db.sales().cancel(&details.sale.id).await.unwrap();
        assert_eq!(sale.status, SaleStatus::Cancelled);

        // Stock stays decremented until a manual movement puts it back.
        let cola = db.products().get_by_id(&catalog.cola.id).await.unwrap().unwrap();
        assert_eq!(cola.stock, catalog.cola.stock - 1);
        db.stock()
            .record_movement(&NewMovement {
                product_id: cola.id.clone(),
                change: 1,
                reason: StockReason::Adjustment,
                note: Some(format!("cancelled {}", sale.receipt_number)),
            })
            .await
            .unwrap();
        let cola = db.products().get_by_id(&catalog.cola.id).await.unwrap().unwrap();
        assert_eq!(cola.stock, catalog.cola.stock);
        assert!(db.stock_movements().reconcile(&cola.id).await.unwrap().in_sync);

        let err = db.sales().cancel(&details.sale.id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::SaleCancelled { .. })));

        let err = db.sales().cancel("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_stale_refund_state_is_a_conflict() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;
        let details = db
            .checkout()
            .checkout(simple_checkout(&catalog, 1))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let summary = RefundSummary::from_returns(
            details.sale.total_gross(),
            [tillpoint_core::Money::from_cents(10)],
        );
        let err = SaleRepository::set_refund_state_tx(&mut conn, &details.sale.id, 99, summary)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
