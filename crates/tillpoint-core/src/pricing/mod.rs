//! # Promotion Pricing
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   resolver   │──►│   selector   │──►│  calculator  │
//! │ which apply  │   │ pick one     │   │ how much     │
//! └──────────────┘   └──────────────┘   └──────────────┘
//!          └──────────────┬───────────────────┘
//!                  ┌──────▼──────┐        ┌──────────────┐
//!                  │    cart     │        │ verification │
//!                  │ price a line│        │ at checkout  │
//!                  └─────────────┘        └──────────────┘
//! ```

pub mod calculator;
pub mod cart;
pub mod resolver;
pub mod selector;
pub mod verification;

pub use calculator::{calculate_discount, calculate_savings, DiscountBreakdown, DiscountDetail};
pub use cart::{price_line, CartItem, PricedLine, PromotionApplied, PromotionSnapshot};
pub use resolver::{resolve_applicable, PromotionRule};
pub use selector::{select_best, SelectedPromotion};
pub use verification::{verify_manual_discount, verify_promoted_discount, SubmittedDiscount};

#[cfg(test)]
pub(crate) fn test_promotion(
    id: &str,
    promotion_type: crate::types::PromotionType,
    priority: i64,
) -> crate::types::Promotion {
    let now = chrono::Utc::now();
    crate::types::Promotion {
        id: id.to_string(),
        name: format!("Promotion {id}"),
        promotion_type,
        scope: crate::types::PromotionScope::Product,
        active: true,
        priority,
        discount_pct_bps: None,
        discount_amount_cents: None,
        buy_qty: None,
        get_qty: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
pub(crate) fn test_product(id: &str, price_cents: i64) -> crate::types::Product {
    let now = chrono::Utc::now();
    crate::types::Product {
        id: id.to_string(),
        name: format!("Product {id}"),
        active: true,
        price_cents,
        branch_id: "branch-1".to_string(),
        category_id: Some("cat-drinks".to_string()),
        stock: 10,
        created_at: now,
        updated_at: now,
    }
}
