//! # Validation Module
//!
//! Structural input checks, run before any business logic or database work.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE - shape of the request                           │
//! │  ├── ids present, quantities and prices positive                       │
//! │  └── discounts/taxes/loyalty non-negative                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Services (inside the transaction)                            │
//! │  ├── stock sufficiency, refundable remaining                           │
//! │  └── promotion re-verification                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), UNIQUE (receipt_number)                       │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_AMOUNT_CENTS, MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_LOYALTY_POINTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted identifier.
pub const MAX_ID_LENGTH: usize = 64;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an opaque entity id.
///
/// ## Example
/// ```rust
/// use tillpoint_core::validation::validate_id;
///
/// assert!(validate_id("productId", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_id("productId", "  ").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LENGTH,
        });
    }

    Ok(())
}

/// Validates a display name (product, promotion, branch).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price in cents. Pricing rejects free items.
///
/// ```rust
/// use tillpoint_core::validation::validate_unit_price;
///
/// assert!(validate_unit_price(1099).is_ok());
/// assert!(validate_unit_price(0).is_err());
/// assert!(validate_unit_price(i64::MAX / 2).is_err());
/// ```
pub fn validate_unit_price(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "unitPrice".to_string(),
        });
    }

    validate_amount_bound("unitPrice", cents)
}

/// Validates a payment amount in cents.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    validate_amount_bound("payment amount", cents)
}

/// Validates an optional line amount (discount, tax): zero up to
/// MAX_AMOUNT_CENTS.
pub fn validate_line_amount(field: &str, cents: i64) -> ValidationResult<()> {
    validate_non_negative(field, cents)?;
    validate_amount_bound(field, cents)
}

/// Validates a loyalty point count on a checkout.
pub fn validate_loyalty_points(field: &str, points: i64) -> ValidationResult<()> {
    validate_non_negative(field, points)?;
    if points > MAX_LOYALTY_POINTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_LOYALTY_POINTS,
        });
    }

    Ok(())
}

fn validate_amount_bound(field: &str, cents: i64) -> ValidationResult<()> {
    if cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates that an optional amount or count is not negative.
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in a cart or checkout.
pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
