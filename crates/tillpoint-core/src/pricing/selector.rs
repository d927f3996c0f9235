//! # Best-Promotion Selector
//!
//! Picks exactly one promotion for a line.
//!
//! ```text
//! for each candidate:
//!     savings = calculate_savings(candidate)
//!     replace best if  priority >  best.priority
//!                  or (priority == best.priority AND savings > best.savings)
//! ```
//!
//! Priority dominates: a priority-10 promotion saving nothing beats a
//! priority-5 promotion saving $0.50. Administrators control precedence
//! explicitly through `priority`.

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::money::Money;
use crate::pricing::calculator::calculate_savings;
use crate::types::Promotion;

/// The winning promotion and the savings it gives on the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPromotion {
    pub promotion: Promotion,
    pub discount: Money,
}

/// Selects the best promotion for `qty` units at `unit_price`.
///
/// Returns `Ok(None)` for an empty candidate list. Savings are recomputed
/// for every candidate, so correctness does not depend on input order;
/// only exact ties (same priority, same savings) keep the earlier one.
///
/// ## Errors
/// Any candidate that cannot be evaluated fails the whole selection.
pub fn select_best(
    promotions: &[Promotion],
    unit_price: Money,
    qty: i64,
) -> CoreResult<Option<SelectedPromotion>> {
    let mut best: Option<SelectedPromotion> = None;

    for promotion in promotions {
        let savings = calculate_savings(promotion, unit_price, qty)?;

        let replace = match &best {
            None => true,
            Some(current) => {
                promotion.priority > current.promotion.priority
                    || (promotion.priority == current.promotion.priority
                        && savings > current.discount)
            }
        };

        if replace {
            best = Some(SelectedPromotion {
                promotion: promotion.clone(),
                discount: savings,
            });
        }
    }

    Ok(best)
}
