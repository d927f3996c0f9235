//! # Repository Module
//!
//! Database repository implementations for Tillpoint.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways In                                          │
//! │                                                                         │
//! │  Reads from callers                Writes from services                │
//! │       │                                  │                              │
//! │       │  db.sales().get_details(id)      │  tx = begin_write(pool)      │
//! │       ▼                                  ▼                              │
//! │  SaleRepository (holds the pool)   SaleRepository::insert_tx(&mut *tx) │
//! │       │                                  │                              │
//! │       │  pool.acquire() → *_tx(conn)     │  ... more *_tx calls ...     │
//! │       ▼                                  ▼                              │
//! │  SQLite Database                   tx.commit()                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every SQL statement lives in a repository. The `*_tx` associated
//! functions take a `&mut SqliteConnection` so a service can run several
//! of them inside one transaction; the `&self` methods acquire a pooled
//! connection and delegate to them.
//!
//! ## Available Repositories
//!
//! - [`branch::BranchRepository`], [`branch::UserRepository`] - branches and cashiers
//! - [`customer::CustomerRepository`] - customers and the loyalty ledger
//! - [`product::ProductRepository`], [`product::CategoryRepository`] - catalog
//! - [`promotion::PromotionRepository`] - promotions and their links
//! - [`sale::SaleRepository`] - sales, lines and payments
//! - [`returns::ReturnRepository`] - returns against sales
//! - [`stock::StockRepository`] - the stock movement ledger

use uuid::Uuid;

pub mod branch;
pub mod customer;
pub mod product;
pub mod promotion;
pub mod returns;
pub mod sale;
pub mod stock;

/// Generates a new row ID.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
