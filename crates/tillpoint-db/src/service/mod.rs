//! # Services
//!
//! Operations that span several repositories.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service              Transaction       Repositories touched            │
//! │  ───────────────────  ───────────────   ──────────────────────────────  │
//! │  CartPricingService   none (reads)      product, promotion              │
//! │  CheckoutService      one per checkout  branch, user, customer,         │
//! │                                         product, promotion, sale, stock │
//! │  ReturnService        one per call      sale, returns, product, stock   │
//! │  StockService         one per call      product, stock                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write path follows the same shape: validate the request shape,
//! `begin_write(&pool)`, run `*_tx` repository calls on the transaction, commit.
//! Returning early with `?` drops the transaction, which rolls it back.

pub mod checkout;
pub mod pricing;
pub mod returns;
pub mod stock;
