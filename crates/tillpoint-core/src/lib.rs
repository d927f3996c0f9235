//! # tillpoint-core: Pure Pricing and Consistency Rules for Tillpoint
//!
//! Everything that decides a price, a total or a refund lives here, as pure
//! functions with zero I/O. The database crate loads rows, calls into this
//! crate, and writes the result inside one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   client cart                                                          │
//! │       │                                                                 │
//! │  ┌────▼────────────────────────────────────────────────────────────┐   │
//! │  │              ★ tillpoint-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   pricing::resolver ─► pricing::selector ─► pricing::calculator │   │
//! │  │            └──────────── pricing::cart ◄───────────┘            │   │
//! │  │                                                                 │   │
//! │  │   pricing::verification   checkout   refund   validation       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └────┬────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │  ┌────▼────────────────────────────────────────────────────────────┐   │
//! │  │  tillpoint-db: repositories + transactional services            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Promotion, Product, Sale, SaleReturn, etc.)
//! - [`money`] - Integer cents and basis-point rounding
//! - [`pricing`] - Resolver, calculator, selector, cart pricing, tamper checks
//! - [`checkout`] - Checkout request shape, validation and totals
//! - [`refund`] - Refundable balance, status derivation, restock rules
//! - [`error`] - Domain error types
//! - [`validation`] - Structural input checks
//!
//! ## Example Usage
//!
//! ```rust
//! use tillpoint_core::money::Money;
//! use tillpoint_core::types::TaxRate;
//!
//! let price = Money::from_cents(1099); // $10.99
//! let tax = price.calculate_tax(TaxRate::from_bps(825));
//!
//! // $10.99 at 8.25% = 90.67¢ → 91¢
//! assert_eq!(tax.cents(), 91);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod money;
pub mod pricing;
pub mod refund;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ErrorResponse, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart or checkout.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// Catches typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest unit price, payment, discount or tax amount accepted, in cents
/// ($1,000,000).
///
/// With [`MAX_ITEM_QUANTITY`] and [`MAX_CART_ITEMS`] this keeps every cart
/// total far inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000;

/// Largest loyalty point count accepted on a single checkout.
pub const MAX_LOYALTY_POINTS: i64 = 1_000_000;
