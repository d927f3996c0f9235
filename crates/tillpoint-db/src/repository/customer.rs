//! # Customer Repository
//!
//! Customers and their loyalty ledger.
//!
//! ## Balance vs Ledger
//! ```text
//! customers.loyalty_points  =  SUM(loyalty_ledger.points WHERE customer_id = ?)
//!
//! earn   +120  ──►  INSERT ledger (+120)  +  UPDATE balance + 120
//! redeem  -50  ──►  INSERT ledger (-50)   +  UPDATE balance - 50 (guarded ≥ 0)
//! ```
//!
//! Both statements run on the caller's transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::pool::begin_write;
use crate::repository::generate_id;
use tillpoint_core::validation::{validate_id, validate_name};
use tillpoint_core::{CoreError, Customer, LoyaltyEntry, LoyaltyKind, ValidationError};

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a customer with a zero balance.
    pub async fn insert(&self, id: &str, name: &str) -> DbResult<Customer> {
        validate_id("customerId", id).map_err(CoreError::from)?;
        validate_name("name", name).map_err(CoreError::from)?;

        let customer = Customer {
            id: id.to_string(),
            name: name.trim().to_string(),
            loyalty_points: 0,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO customers (id, name, loyalty_points, created_at) VALUES (?1, ?2, 0, ?3)",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::find_tx(&mut conn, id).await?)
    }

    /// Grants points outside of a sale (sign-up bonus, goodwill).
    pub async fn grant_points(&self, customer_id: &str, points: i64) -> DbResult<Customer> {
        if points <= 0 {
            return Err(CoreError::from(ValidationError::MustBePositive {
                field: "points".to_string(),
            })
            .into());
        }

        let mut tx = begin_write(&self.pool).await?;
        Self::apply_points_tx(&mut tx, customer_id, None, LoyaltyKind::Earn, points).await?;
        let customer = Self::require_tx(&mut tx, customer_id).await?;
        tx.commit().await?;
        Ok(customer)
    }

    /// The customer's ledger, oldest first.
    pub async fn ledger(&self, customer_id: &str) -> DbResult<Vec<LoyaltyEntry>> {
        let entries = sqlx::query_as::<_, LoyaltyEntry>(
            r#"
            SELECT id, customer_id, sale_id, kind, points, created_at
            FROM loyalty_ledger
            WHERE customer_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Sum of the customer's ledger entries.
    pub async fn ledger_total(&self, customer_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(points), 0) FROM loyalty_ledger WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    pub(crate) async fn find_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            "SELECT id, name, loyalty_points, created_at FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub(crate) async fn require_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Customer> {
        let customer = Self::find_tx(conn, id).await?;
        Ok(customer.ok_or_else(|| CoreError::not_found("customer", id))?)
    }

    /// Moves a customer's balance by `points` and appends the matching
    /// ledger entry. `points` is always positive; `kind` gives the sign.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown customer
    /// - `InsufficientLoyaltyPoints` when a redemption exceeds the balance
    pub(crate) async fn apply_points_tx(
        conn: &mut SqliteConnection,
        customer_id: &str,
        sale_id: Option<&str>,
        kind: LoyaltyKind,
        points: i64,
    ) -> DbResult<()> {
        let delta = match kind {
            LoyaltyKind::Earn => points,
            LoyaltyKind::Redeem => -points,
        };

        debug!(customer_id = %customer_id, delta = delta, "Applying loyalty points");

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET loyalty_points = loyalty_points + ?1
            WHERE id = ?2 AND loyalty_points + ?1 >= 0
            "#,
        )
        .bind(delta)
        .bind(customer_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let customer = Self::require_tx(&mut *conn, customer_id).await?;
            return Err(CoreError::InsufficientLoyaltyPoints {
                customer_id: customer_id.to_string(),
                available: customer.loyalty_points,
                requested: points,
            }
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO loyalty_ledger (id, customer_id, sale_id, kind, points, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(generate_id())
        .bind(customer_id)
        .bind(sale_id)
        .bind(kind)
        .bind(delta)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
