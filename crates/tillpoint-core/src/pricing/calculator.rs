//! # Discount Calculator
//!
//! Turns one promotion plus a unit price and quantity into a discount.
//!
//! ## Arithmetic by Type
//! ```text
//! PERCENTAGE    discount = round(unit × qty × bps / 10000)      (once, at the end)
//! FIXED_AMOUNT  discount = min(amount × qty, unit × qty)        (never negative price)
//! BUY_X_GET_Y   sets     = floor(qty / (buy + get))             (partial sets earn nothing)
//!               free     = sets × get
//!               discount = free × unit
//! ```
//!
//! Malformed input is an error, never a silent zero: "no discount" and
//! "could not compute" must stay distinguishable.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::types::{Promotion, PromotionType};
use crate::validation::{validate_quantity, validate_unit_price};

/// Type-specific breakdown of how a discount was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum DiscountDetail {
    #[serde(rename_all = "camelCase")]
    Percentage { discount_pct_bps: i64 },
    #[serde(rename_all = "camelCase")]
    FixedAmount {
        amount_per_unit: Money,
        /// True when the raw amount exceeded the line gross.
        capped: bool,
    },
    #[serde(rename_all = "camelCase")]
    BuyXGetY {
        buy_qty: i64,
        get_qty: i64,
        complete_sets: i64,
        free_items: i64,
        paid_items: i64,
    },
}

/// Result of [`calculate_discount`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DiscountBreakdown {
    pub discount: Money,
    /// `unit × qty − discount`
    pub final_price: Money,
    /// `final_price / qty`, half-up. Informational only.
    pub effective_unit_price: Money,
    pub detail: DiscountDetail,
}

/// Computes the full discount breakdown for a line.
///
/// ## Errors
/// - `MustBePositive` when `unit_price` or `qty` is not positive
/// - `OutOfRange` when either is above its limit
/// - `InvalidPromotion` when the promotion lacks its type's fields
///
/// ```rust
/// use tillpoint_core::money::Money;
/// # use tillpoint_core::types::*;
/// # use tillpoint_core::pricing::calculator::calculate_discount;
/// # let now = chrono::Utc::now();
/// # let promo = Promotion {
/// #     id: "p".into(), name: "3 for 2".into(),
/// #     promotion_type: PromotionType::BuyXGetY, scope: PromotionScope::Product,
/// #     active: true, priority: 0, discount_pct_bps: None, discount_amount_cents: None,
/// #     buy_qty: Some(2), get_qty: Some(1), created_at: now, updated_at: now,
/// # };
/// let breakdown = calculate_discount(&promo, Money::from_cents(500), 9).unwrap();
/// assert_eq!(breakdown.discount.cents(), 1500); // 3 free
/// ```
pub fn calculate_discount(
    promotion: &Promotion,
    unit_price: Money,
    qty: i64,
) -> CoreResult<DiscountBreakdown> {
    validate_unit_price(unit_price.cents())?;
    validate_quantity(qty)?;
    promotion.validate()?;

    let gross = unit_price.multiply_quantity(qty);

    // validate() guarantees the Option fields for each arm; unwrap_or keeps
    // this total without panicking.
    let (discount, detail) = match promotion.promotion_type {
        PromotionType::Percentage => {
            let bps = promotion.discount_pct_bps.unwrap_or(0);
            (
                gross.percentage_of(bps as u32),
                DiscountDetail::Percentage {
                    discount_pct_bps: bps,
                },
            )
        }
        PromotionType::FixedAmount => {
            let per_unit = Money::from_cents(promotion.discount_amount_cents.unwrap_or(0));
            let raw = per_unit.multiply_quantity(qty);
            (
                raw.min(gross),
                DiscountDetail::FixedAmount {
                    amount_per_unit: per_unit,
                    capped: raw > gross,
                },
            )
        }
        PromotionType::BuyXGetY => {
            let buy_qty = promotion.buy_qty.unwrap_or(1);
            let get_qty = promotion.get_qty.unwrap_or(1);
            let set_size = buy_qty + get_qty;
            let complete_sets = qty / set_size;
            let free_items = complete_sets * get_qty;
            let paid_items = qty - free_items;
            (
                unit_price.multiply_quantity(free_items),
                DiscountDetail::BuyXGetY {
                    buy_qty,
                    get_qty,
                    complete_sets,
                    free_items,
                    paid_items,
                },
            )
        }
    };

    let final_price = gross - discount;
    let effective_unit_price =
        Money::from_cents((final_price.cents() * 2 + qty) / (qty * 2));

    Ok(DiscountBreakdown {
        discount,
        final_price,
        effective_unit_price,
        detail,
    })
}

/// The savings a promotion would give on a line. Same errors as
/// [`calculate_discount`].
pub fn calculate_savings(promotion: &Promotion, unit_price: Money, qty: i64) -> CoreResult<Money> {
    calculate_discount(promotion, unit_price, qty).map(|b| b.discount)
}
