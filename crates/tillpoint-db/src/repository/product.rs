//! # Product Repository
//!
//! Database operations for products and categories.
//!
//! ## Key Operations
//! - Catalog inserts (with the opening `initial_stock` movement)
//! - Guarded stock changes used by checkout, returns and stock admin
//!
//! ## Guarded Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Why the WHERE clause matters                         │
//! │                                                                         │
//! │  UPDATE products SET stock = stock + ?change                           │
//! │  WHERE id = ? AND stock + ?change >= 0                                  │
//! │  RETURNING stock                                                        │
//! │                                                                         │
//! │  Terminal A: sells 3 of 4   → row updated, stock 1                     │
//! │  Terminal B: sells 2 of "4" → 0 rows, InsufficientStock, rollback      │
//! │                                                                         │
//! │  The check and the write are one statement, so a stale read can        │
//! │  never push stock below zero.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `products.stock` is never written without a matching stock movement;
//! callers pair every `*_stock_tx` call with `StockRepository::insert_tx`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::pool::begin_write;
use crate::repository::stock::{MovementInsert, StockRepository};
use tillpoint_core::validation::{
    validate_id, validate_line_amount, validate_name, validate_non_negative,
};
use tillpoint_core::{Category, CoreError, Product, StockReason};

const PRODUCT_COLUMNS: &str =
    "id, name, active, price_cents, branch_id, category_id, stock, created_at, updated_at";

/// Input for a catalog insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub branch_id: String,
    pub category_id: Option<String>,
    /// Opening stock, recorded as an `initial_stock` movement.
    #[serde(default)]
    pub initial_stock: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.insert(&new_product).await?;
/// let product = repo.get_by_id(&product.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product and its opening stock movement in one transaction.
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        validate_id("productId", &new.id).map_err(CoreError::from)?;
        validate_name("name", &new.name).map_err(CoreError::from)?;
        validate_line_amount("price", new.price_cents).map_err(CoreError::from)?;
        validate_non_negative("initialStock", new.initial_stock).map_err(CoreError::from)?;

        debug!(id = %new.id, stock = new.initial_stock, "Inserting product");

        let now = Utc::now();
        let product = Product {
            id: new.id.clone(),
            name: new.name.trim().to_string(),
            active: new.active,
            price_cents: new.price_cents,
            branch_id: new.branch_id.clone(),
            category_id: new.category_id.clone(),
            stock: new.initial_stock,
            created_at: now,
            updated_at: now,
        };

        let mut tx = begin_write(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, active, price_cents, branch_id,
                category_id, stock, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.active)
        .bind(product.price_cents)
        .bind(&product.branch_id)
        .bind(&product.category_id)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        if product.stock > 0 {
            StockRepository::insert_tx(
                &mut tx,
                MovementInsert {
                    product_id: &product.id,
                    branch_id: &product.branch_id,
                    change: product.stock,
                    reason: StockReason::InitialStock,
                    sale_id: None,
                    return_id: None,
                    note: None,
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::find_tx(&mut conn, id).await?)
    }

    /// Active products of a branch, by name.
    pub async fn list_for_branch(&self, branch_id: &str) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE branch_id = ?1 AND active = 1 ORDER BY name"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(branch_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Activates or deactivates a product. Inactive products cannot be
    /// priced or sold.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active = active, "Setting product active flag");

        let result = sqlx::query("UPDATE products SET active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("product", id).into());
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub(crate) async fn find_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<Product>, sqlx::Error> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub(crate) async fn require_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
        let product = Self::find_tx(conn, id).await?;
        Ok(product.ok_or_else(|| CoreError::not_found("product", id))?)
    }

    /// Takes `quantity` units out for a sale.
    ///
    /// ## Errors
    /// `InsufficientStock` with the stock seen at write time.
    pub(crate) async fn decrement_for_sale_tx(
        conn: &mut SqliteConnection,
        product: &Product,
        quantity: i64,
    ) -> DbResult<i64> {
        match Self::guarded_change(&mut *conn, &product.id, -quantity).await? {
            Some(stock) => Ok(stock),
            None => {
                let current = Self::require_tx(&mut *conn, &product.id).await?;
                Err(CoreError::InsufficientStock {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    available: current.stock,
                    requested: quantity,
                }
                .into())
            }
        }
    }

    /// Applies a signed stock change that must not take stock below zero.
    ///
    /// ## Errors
    /// `NegativeStock` with the stock the change would have produced.
    pub(crate) async fn apply_stock_change_tx(
        conn: &mut SqliteConnection,
        product_id: &str,
        change: i64,
    ) -> DbResult<i64> {
        match Self::guarded_change(&mut *conn, product_id, change).await? {
            Some(stock) => Ok(stock),
            None => {
                let current = Self::require_tx(&mut *conn, product_id).await?;
                Err(CoreError::NegativeStock {
                    product_id: product_id.to_string(),
                    resulting: current.stock + change,
                }
                .into())
            }
        }
    }

    /// `None` when the product is missing or the change would go negative.
    async fn guarded_change(
        conn: &mut SqliteConnection,
        product_id: &str,
        change: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        debug!(product_id = %product_id, change = change, "Updating stock");

        sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + ?1, updated_at = ?3
            WHERE id = ?2 AND stock + ?1 >= 0
            RETURNING stock
            "#,
        )
        .bind(change)
        .bind(product_id)
        .bind(Utc::now())
        .fetch_optional(conn)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn insert(&self, id: &str, name: &str) -> DbResult<Category> {
        validate_id("categoryId", id).map_err(CoreError::from)?;
        validate_name("name", name).map_err(CoreError::from)?;

        let category = Category {
            id: id.to_string(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&category.id)
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&self.pool)
            .await?;

        Ok(category)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at FROM categories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }
}
