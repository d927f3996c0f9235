//! # Discount Verification
//!
//! Client-submitted discounts are never trusted as-is. Inside the checkout
//! transaction each discounted line is checked against the live promotion:
//!
//! ```text
//! line has promotionId?
//!   ├── yes ─► promotion still applicable?      no → PromotionNotApplicable
//!   │          snapshot matches live fields?    no → PromotionChanged
//!   │          |submitted − recomputed| ≤ tol?  no → DiscountMismatch
//!   │          ─► persist the recomputed discount
//!   │
//!   └── no ──► discount > 0?
//!                ├── manual discounts allowed → persist as submitted
//!                └── otherwise                → ManualDiscountNotAllowed
//! ```
//!
//! Applicability needs the promotion's links, so the caller checks it and
//! passes the result in.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::calculator::calculate_savings;
use crate::pricing::cart::PromotionSnapshot;
use crate::types::Promotion;

/// A discounted line as submitted at checkout.
#[derive(Debug, Clone, Copy)]
pub struct SubmittedDiscount<'a> {
    pub product_id: &'a str,
    pub unit_price: Money,
    pub quantity: i64,
    pub discount: Money,
}

/// Verifies a promotion-backed discount and returns the discount to persist.
///
/// The recomputed value is returned so rounding noise within the tolerance
/// never reaches the ledger.
pub fn verify_promoted_discount(
    line: SubmittedDiscount<'_>,
    live: &Promotion,
    applicable: bool,
    snapshot: Option<&PromotionSnapshot>,
    tolerance: Money,
) -> CoreResult<Money> {
    if !applicable {
        return Err(CoreError::PromotionNotApplicable {
            promotion_id: live.id.clone(),
            product_id: line.product_id.to_string(),
        });
    }

    if let Some(snapshot) = snapshot {
        if !snapshot.matches(live) {
            return Err(CoreError::PromotionChanged {
                promotion_id: live.id.clone(),
            });
        }
    }

    let expected = calculate_savings(live, line.unit_price, line.quantity)?;
    if !line.discount.within(expected, tolerance) {
        return Err(CoreError::DiscountMismatch {
            product_id: line.product_id.to_string(),
            submitted: line.discount.cents(),
            expected: expected.cents(),
        });
    }

    Ok(expected)
}

/// Verifies a discount with no promotion behind it.
pub fn verify_manual_discount(line: SubmittedDiscount<'_>, allow_manual: bool) -> CoreResult<Money> {
    if line.discount.is_positive() && !allow_manual {
        return Err(CoreError::ManualDiscountNotAllowed {
            product_id: line.product_id.to_string(),
        });
    }
    Ok(line.discount)
}
