//! # tillpoint-db: Persistence and Transactions for Tillpoint
//!
//! SQLite storage for the catalog, sales, returns and both ledgers, plus
//! the services that run checkout and returns as single transactions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillpoint Data Flow                              │
//! │                                                                         │
//! │  caller (HTTP handler, CLI, till UI)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  tillpoint-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (service/)    │───►│ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ CartPricing   │    │ ProductRepo   │    │ 001_initial_ │  │   │
//! │  │   │ Checkout      │    │ SaleRepo      │    │ schema.sql   │  │   │
//! │  │   │ Return, Stock │    │ StockRepo ... │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │  pure rules                                        │   │
//! │  │           ▼                                                     │   │
//! │  │   tillpoint-core                                                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and the `Database` handle
//! - [`config`] - Engine configuration from the environment
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Table-level access, including `*_tx` helpers
//! - [`service`] - Cart pricing, checkout, returns and stock corrections
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tillpoint_db::{Database, EngineConfig};
//!
//! let db = Database::connect(EngineConfig::from_env()?).await?;
//!
//! let priced = db.cart_pricing().price_cart(&items, Some("branch-1")).await?;
//! let sale = db.checkout().checkout(request).await?;
//! let outcome = db.refunds().create_return(return_request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::product::ProductRepository;
pub use repository::sale::{SaleDetails, SaleRepository};
pub use repository::stock::StockReconciliation;
pub use service::checkout::CheckoutService;
pub use service::pricing::CartPricingService;
pub use service::returns::{ReturnOutcome, ReturnService};
pub use service::stock::{NewMovement, StockService};
