//! # Error Types
//!
//! Domain-specific error types for tillpoint-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tillpoint-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tillpoint-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ErrorResponse           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error classifies itself into an [`ErrorKind`]. Checkout and return
//! failures are never downgraded; cart pricing failures are, by the caller.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse error classification shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorKind {
    /// Caller-correctable input or business-rule violation.
    BadRequest,
    /// A referenced entity does not exist.
    NotFound,
    /// Uniqueness violation or a concurrent writer won the race.
    Conflict,
    /// Unexpected persistence failure.
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    ///
    /// `entity` is a lowercase noun ("product", "branch", "sale", ...).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The product exists but is not sellable. Non-fatal for cart pricing.
    #[error("Product {product_id} is inactive")]
    ProductInactive { product_id: String },

    /// Insufficient stock to complete sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Check stock inside transaction: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { name: "Cola", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 Cola in stock"
    /// ```
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        name: String,
        available: i64,
        requested: i64,
    },

    /// A promotion's configuration is malformed for its type.
    #[error("Invalid promotion {promotion_id}: {reason}")]
    InvalidPromotion { promotion_id: String, reason: String },

    /// The submitted promotion is inactive or does not cover this product/branch.
    #[error("Promotion {promotion_id} does not apply to product {product_id}")]
    PromotionNotApplicable {
        promotion_id: String,
        product_id: String,
    },

    /// The promotion was edited after the cart was priced.
    #[error("Promotion {promotion_id} changed since the cart was priced")]
    PromotionChanged { promotion_id: String },

    /// The submitted line discount does not match the recomputed one.
    #[error("Discount mismatch for product {product_id}: submitted {submitted}, expected {expected}")]
    DiscountMismatch {
        product_id: String,
        submitted: i64,
        expected: i64,
    },

    /// A line discount exceeds the line gross.
    #[error("Discount {discount} exceeds line gross {gross} for product {product_id}")]
    DiscountExceedsGross {
        product_id: String,
        discount: i64,
        gross: i64,
    },

    /// A discount without a promotion while manual discounts are disabled.
    #[error("Manual discounts are not allowed (product {product_id})")]
    ManualDiscountNotAllowed { product_id: String },

    #[error("Sale {sale_id} is already fully refunded")]
    SaleFullyRefunded { sale_id: String },

    #[error("Sale {sale_id} is cancelled")]
    SaleCancelled { sale_id: String },

    /// Refund would push the cumulative refunded amount past the sale total.
    #[error("Refund of {requested} exceeds remaining refundable amount {remaining}")]
    RefundExceedsRemaining {
        sale_id: String,
        requested: i64,
        transaction_total: i64,
        already_returned: i64,
        remaining: i64,
    },

    #[error("Customer {customer_id} has {available} loyalty points, {requested} requested")]
    InsufficientLoyaltyPoints {
        customer_id: String,
        available: i64,
        requested: i64,
    },

    #[error("Payments total {paid} is less than sale total {total}")]
    PaymentShortfall { paid: i64, total: i64 },

    /// Restock request that does not match what was sold.
    #[error("Invalid restock for product {product_id}: {reason}")]
    InvalidRestock { product_id: String, reason: String },

    /// A stock correction would leave stock below zero.
    #[error("Stock for product {product_id} would become negative ({resulting})")]
    NegativeStock { product_id: String, resulting: i64 },

    /// A concurrent writer changed the row between read and write.
    #[error("Concurrent modification of {entity} {id}")]
    Conflict { entity: &'static str, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Conflict { .. } => ErrorKind::Conflict,
            _ => ErrorKind::BadRequest,
        }
    }

    /// Machine-readable payload for the UI, where one is useful.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CoreError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            CoreError::InsufficientStock {
                product_id,
                available,
                requested,
                ..
            } => Some(json!({
                "productId": product_id,
                "currentStock": available,
                "requested": requested,
            })),
            CoreError::DiscountMismatch {
                product_id,
                submitted,
                expected,
            } => Some(json!({
                "productId": product_id,
                "submitted": submitted,
                "expected": expected,
            })),
            CoreError::RefundExceedsRemaining {
                transaction_total,
                already_returned,
                remaining,
                ..
            } => Some(json!({
                "transactionTotal": transaction_total,
                "alreadyReturned": already_returned,
                "remainingRefundable": remaining,
            })),
            CoreError::InsufficientLoyaltyPoints {
                available,
                requested,
                ..
            } => Some(json!({ "available": available, "requested": requested })),
            CoreError::PaymentShortfall { paid, total } => {
                Some(json!({ "paid": paid, "total": total }))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for structural checks before any business logic or database work.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Error Response
// =============================================================================

/// Structured error shape handed to whatever transport sits on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    #[ts(type = "unknown")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&CoreError> for ErrorResponse {
    fn from(err: &CoreError) -> Self {
        ErrorResponse {
            kind: err.kind(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            name: "Cola".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Cola: available 3, requested 5"
        );
        assert_eq!(
            CoreError::not_found("branch", "b-9").to_string(),
            "branch not found: b-9"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "productId".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(CoreError::not_found("sale", "s").kind(), ErrorKind::NotFound);
        assert_eq!(
            CoreError::Conflict {
                entity: "sale",
                id: "s".to_string()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CoreError::SaleFullyRefunded {
                sale_id: "s".to_string()
            }
            .kind(),
            ErrorKind::BadRequest
        );
    }

    #[test]
    fn test_over_refund_surfaces_remaining() {
        let err = CoreError::RefundExceedsRemaining {
            sale_id: "s-1".to_string(),
            requested: 5000,
            transaction_total: 10000,
            already_returned: 7000,
            remaining: 3000,
        };
        let response = ErrorResponse::from(&err);
        assert_eq!(response.kind, ErrorKind::BadRequest);
        let details = response.details.clone().unwrap();
        assert_eq!(details["remainingRefundable"], 3000);
        assert_eq!(details["alreadyReturned"], 7000);
        assert_eq!(details["transactionTotal"], 10000);

        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized["kind"], "BAD_REQUEST");
    }
}
