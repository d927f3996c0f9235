//! # Promotion Resolver
//!
//! Decides which promotions apply to a product at a branch, and in what
//! order of precedence.
//!
//! ## Applicability
//! ```text
//! active
//!   AND (branches empty OR branch_id ∈ branches)
//!   AND ( scope = PRODUCT  AND product.id          ∈ products
//!      OR scope = CATEGORY AND product.category_id ∈ categories )
//! ```
//!
//! ## Ordering
//! priority DESC, then created_at DESC (newest wins ties). The sort is
//! stable so equal keys keep the order the repository returned.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Product, Promotion, PromotionScope};

/// A promotion together with its product, category and branch links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRule {
    pub promotion: Promotion,
    pub product_ids: Vec<String>,
    pub category_ids: Vec<String>,
    /// Empty means every branch.
    pub branch_ids: Vec<String>,
}

impl PromotionRule {
    /// Whether this rule covers `product` when sold at `branch_id`.
    pub fn applies_to(&self, product: &Product, branch_id: &str) -> bool {
        if !self.promotion.active {
            return false;
        }

        if !self.branch_ids.is_empty() && !self.branch_ids.iter().any(|b| b == branch_id) {
            return false;
        }

        match self.promotion.scope {
            PromotionScope::Product => self.product_ids.iter().any(|p| *p == product.id),
            PromotionScope::Category => match &product.category_id {
                Some(category_id) => self.category_ids.iter().any(|c| c == category_id),
                None => false,
            },
        }
    }
}

/// Filters `rules` to those applicable to `product` and orders them by
/// precedence.
///
/// `branch_id` defaults to the product's own branch.
///
/// ## Errors
/// `ProductInactive` when the product is not sellable. Cart pricing treats
/// this as a per-line failure.
pub fn resolve_applicable(
    rules: Vec<PromotionRule>,
    product: &Product,
    branch_id: Option<&str>,
) -> CoreResult<Vec<Promotion>> {
    if !product.active {
        return Err(CoreError::ProductInactive {
            product_id: product.id.clone(),
        });
    }

    let branch_id = branch_id.unwrap_or(&product.branch_id);

    let mut applicable: Vec<Promotion> = rules
        .into_iter()
        .filter(|rule| rule.applies_to(product, branch_id))
        .map(|rule| rule.promotion)
        .collect();

    applicable.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    Ok(applicable)
}
