//! # Refund Rules
//!
//! Pure refund arithmetic. The sale's `refunded_cents` and `status` are
//! always re-derived from the complete set of its returns, never patched
//! incrementally.
//!
//! ## Status Flow
//! ```text
//! COMPLETED ──return──► PARTIALLY_REFUNDED ──return──► REFUNDED
//!     ▲                          │
//!     └──── delete/update ───────┘   (admin corrections re-sum the set)
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{ReturnReason, Sale, SaleStatus};
use crate::validation::{validate_id, validate_quantity};

// =============================================================================
// Requests
// =============================================================================

/// Units to put back into stock as part of a return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RestockLine {
    pub product_id: String,
    #[serde(rename = "qty")]
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReturnRequest {
    #[serde(rename = "originalTransactionId")]
    pub sale_id: String,
    #[serde(rename = "returnAmount")]
    pub amount_cents: i64,
    /// Case-insensitive; see [`ReturnReason`].
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub processed_by: Option<String>,
    #[serde(default)]
    pub restock: Vec<RestockLine>,
}

impl ReturnRequest {
    /// Structural checks; the reason is parsed here so an invalid one fails
    /// before the transaction opens.
    pub fn validate(&self) -> CoreResult<Option<ReturnReason>> {
        validate_id("originalTransactionId", &self.sale_id)?;
        validate_refund_amount(Money::from_cents(self.amount_cents))?;
        for line in &self.restock {
            validate_id("productId", &line.product_id)?;
            validate_quantity(line.quantity)?;
        }
        parse_reason(self.reason.as_deref())
    }
}

/// Administrative correction of an existing return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReturnUpdate {
    #[serde(rename = "returnAmount", default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Parses an optional reason. Blank counts as absent.
pub fn parse_reason(reason: Option<&str>) -> CoreResult<Option<ReturnReason>> {
    match reason.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Ok(Some(raw.parse::<ReturnReason>()?)),
    }
}

fn validate_refund_amount(amount: Money) -> CoreResult<()> {
    if !amount.is_positive() {
        return Err(crate::error::ValidationError::MustBePositive {
            field: "returnAmount".to_string(),
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Balances
// =============================================================================

/// `refunded_cents` and the derived status, recomputed from a full set of
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RefundSummary {
    pub refunded: Money,
    pub status: SaleStatus,
}

impl RefundSummary {
    pub fn from_returns<I>(total_gross: Money, amounts: I) -> Self
    where
        I: IntoIterator<Item = Money>,
    {
        let refunded: Money = amounts.into_iter().sum();
        RefundSummary {
            refunded,
            status: SaleStatus::from_refunds(refunded, total_gross),
        }
    }
}

/// `total_gross − already_returned`, floored at zero.
pub fn remaining_refundable(total_gross: Money, already_returned: Money) -> Money {
    (total_gross - already_returned).max(Money::zero())
}

/// Validates a new return against a sale and the returns it already has.
///
/// Returns the summary the sale must be updated to.
///
/// ## Errors
/// - `SaleCancelled` / `SaleFullyRefunded` for sales with nothing to refund
/// - `MustBePositive` for a non-positive amount
/// - `RefundExceedsRemaining` with the remaining balance for the UI
pub fn validate_refund(
    sale: &Sale,
    existing: &[Money],
    requested: Money,
) -> CoreResult<RefundSummary> {
    match sale.status {
        SaleStatus::Cancelled => {
            return Err(CoreError::SaleCancelled {
                sale_id: sale.id.clone(),
            })
        }
        SaleStatus::Refunded => {
            return Err(CoreError::SaleFullyRefunded {
                sale_id: sale.id.clone(),
            })
        }
        _ => {}
    }

    validate_refund_amount(requested)?;

    let already_returned: Money = existing.iter().sum();
    let remaining = remaining_refundable(sale.total_gross(), already_returned);
    if requested > remaining {
        return Err(CoreError::RefundExceedsRemaining {
            sale_id: sale.id.clone(),
            requested: requested.cents(),
            transaction_total: sale.total_gross_cents,
            already_returned: already_returned.cents(),
            remaining: remaining.cents(),
        });
    }

    Ok(RefundSummary::from_returns(
        sale.total_gross(),
        existing.iter().copied().chain(std::iter::once(requested)),
    ))
}

/// Validates an edited return amount against the other returns of the sale.
pub fn validate_refund_update(
    sale: &Sale,
    others: &[Money],
    new_amount: Money,
) -> CoreResult<RefundSummary> {
    if sale.status == SaleStatus::Cancelled {
        return Err(CoreError::SaleCancelled {
            sale_id: sale.id.clone(),
        });
    }
    validate_refund_amount(new_amount)?;

    let already_returned: Money = others.iter().sum();
    let remaining = remaining_refundable(sale.total_gross(), already_returned);
    if new_amount > remaining {
        return Err(CoreError::RefundExceedsRemaining {
            sale_id: sale.id.clone(),
            requested: new_amount.cents(),
            transaction_total: sale.total_gross_cents,
            already_returned: already_returned.cents(),
            remaining: remaining.cents(),
        });
    }

    Ok(RefundSummary::from_returns(
        sale.total_gross(),
        others.iter().copied().chain(std::iter::once(new_amount)),
    ))
}

/// Checks that `requested` units of a product can go back into stock.
pub fn validate_restock(
    product_id: &str,
    sold: i64,
    already_restocked: i64,
    requested: i64,
) -> CoreResult<()> {
    if sold == 0 {
        return Err(CoreError::InvalidRestock {
            product_id: product_id.to_string(),
            reason: "product is not on this sale".to_string(),
        });
    }

    let restockable = sold - already_restocked;
    if requested > restockable {
        return Err(CoreError::InvalidRestock {
            product_id: product_id.to_string(),
            reason: format!("only {restockable} of {sold} sold units can be restocked"),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
