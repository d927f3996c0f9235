//! # Cart Line Pricing
//!
//! Prices one cart line from its applicable promotions. The database layer
//! drives this per line and downgrades any failure with
//! [`PricedLine::failed`], so one broken promotion never blocks the rest of
//! the cart.
//!
//! ## Line Flow
//! ```text
//! candidates ──► select_best ──► none / zero savings ──► PricedLine::unpriced
//!                     │
//!                     └── savings > 0 ──► calculate_discount
//!                                           + PromotionSnapshot
//!                                           + PromotionApplied
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::pricing::calculator::{calculate_discount, DiscountDetail};
use crate::pricing::selector::select_best;
use crate::types::{Promotion, PromotionScope, PromotionType};
use crate::validation::{validate_id, validate_quantity, validate_unit_price};

/// One line of a cart to be priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartItem {
    pub product_id: String,
    #[serde(rename = "unitPrice")]
    pub unit_price_cents: i64,
    #[serde(rename = "qty")]
    pub quantity: i64,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, unit_price_cents: i64, quantity: i64) -> Self {
        CartItem {
            product_id: product_id.into(),
            unit_price_cents,
            quantity,
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn gross(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    pub fn validate(&self) -> CoreResult<()> {
        validate_id("productId", &self.product_id)?;
        validate_unit_price(self.unit_price_cents)?;
        validate_quantity(self.quantity)?;
        Ok(())
    }
}

/// Frozen copy of a promotion's pricing fields, taken when the cart was
/// priced. Checkout compares it to the live promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PromotionSnapshot {
    pub id: String,
    pub name: String,
    pub promotion_type: PromotionType,
    pub scope: PromotionScope,
    pub priority: i64,
    pub discount_pct_bps: Option<i64>,
    pub discount_amount_cents: Option<i64>,
    pub buy_qty: Option<i64>,
    pub get_qty: Option<i64>,
    #[ts(as = "String")]
    pub captured_at: DateTime<Utc>,
}

impl PromotionSnapshot {
    pub fn capture(promotion: &Promotion, at: DateTime<Utc>) -> Self {
        PromotionSnapshot {
            id: promotion.id.clone(),
            name: promotion.name.clone(),
            promotion_type: promotion.promotion_type,
            scope: promotion.scope,
            priority: promotion.priority,
            discount_pct_bps: promotion.discount_pct_bps,
            discount_amount_cents: promotion.discount_amount_cents,
            buy_qty: promotion.buy_qty,
            get_qty: promotion.get_qty,
            captured_at: at,
        }
    }

    /// True when every field that affects the discount is unchanged.
    ///
    /// Name and priority are not pricing fields.
    pub fn matches(&self, live: &Promotion) -> bool {
        self.id == live.id
            && self.promotion_type == live.promotion_type
            && self.scope == live.scope
            && self.discount_pct_bps == live.discount_pct_bps
            && self.discount_amount_cents == live.discount_amount_cents
            && self.buy_qty == live.buy_qty
            && self.get_qty == live.get_qty
    }
}

/// Summary of the promotion that priced a line, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PromotionApplied {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub promotion_type: PromotionType,
    pub scope: PromotionScope,
    pub savings: Money,
    pub final_price: Money,
    pub effective_unit_price: Money,
    pub detail: DiscountDetail,
}

/// A cart line after pricing. Output order always matches input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedLine {
    pub product_id: String,
    #[serde(rename = "unitPrice")]
    pub unit_price_cents: i64,
    #[serde(rename = "qty")]
    pub quantity: i64,
    #[serde(rename = "discount")]
    pub discount_cents: i64,
    pub promotion_id: Option<String>,
    pub promotion_snapshot: Option<PromotionSnapshot>,
    #[serde(rename = "lineTotal")]
    pub line_total_cents: i64,
    pub promotion_applied: Option<PromotionApplied>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_error: Option<String>,
}

impl PricedLine {
    /// Line with no promotion.
    pub fn unpriced(item: &CartItem) -> Self {
        PricedLine {
            product_id: item.product_id.clone(),
            unit_price_cents: item.unit_price_cents,
            quantity: item.quantity,
            discount_cents: 0,
            promotion_id: None,
            promotion_snapshot: None,
            line_total_cents: item.gross().cents(),
            promotion_applied: None,
            promotion_error: None,
        }
    }

    /// Line whose pricing failed: zero discount plus an error note.
    pub fn failed(item: &CartItem, error: &dyn fmt::Display) -> Self {
        PricedLine {
            promotion_error: Some(error.to_string()),
            ..PricedLine::unpriced(item)
        }
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }
}

/// Prices one line against its already-resolved candidates.
///
/// `candidates` should come from
/// [`resolve_applicable`](crate::pricing::resolver::resolve_applicable);
/// the selector does not rely on their order.
pub fn price_line(
    item: &CartItem,
    candidates: &[Promotion],
    now: DateTime<Utc>,
) -> CoreResult<PricedLine> {
    item.validate()?;

    let Some(selected) = select_best(candidates, item.unit_price(), item.quantity)? else {
        return Ok(PricedLine::unpriced(item));
    };

    if selected.discount.is_zero() {
        return Ok(PricedLine::unpriced(item));
    }

    let promotion = &selected.promotion;
    let breakdown = calculate_discount(promotion, item.unit_price(), item.quantity)?;

    Ok(PricedLine {
        product_id: item.product_id.clone(),
        unit_price_cents: item.unit_price_cents,
        quantity: item.quantity,
        discount_cents: breakdown.discount.cents(),
        promotion_id: Some(promotion.id.clone()),
        promotion_snapshot: Some(PromotionSnapshot::capture(promotion, now)),
        line_total_cents: breakdown.final_price.cents(),
        promotion_applied: Some(PromotionApplied {
            id: promotion.id.clone(),
            name: promotion.name.clone(),
            promotion_type: promotion.promotion_type,
            scope: promotion.scope,
            savings: breakdown.discount,
            final_price: breakdown.final_price,
            effective_unit_price: breakdown.effective_unit_price,
            detail: breakdown.detail,
        }),
        promotion_error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::test_promotion;
    use chrono::Utc;

    fn ten_percent(id: &str) -> Promotion {
        let mut promo = test_promotion(id, PromotionType::Percentage, 1);
        promo.discount_pct_bps = Some(1000);
        promo
    }

    #[test]
    fn test_no_candidates_gives_zero_discount() {
        let item = CartItem::new("prod-1", 500, 2);
        let line = price_line(&item, &[], Utc::now()).unwrap();

        assert_eq!(line.discount_cents, 0);
        assert_eq!(line.line_total_cents, 1000);
        assert!(line.promotion_id.is_none());
        assert!(line.promotion_snapshot.is_none());
    }

    #[test]
    fn test_zero_savings_winner_is_not_attached() {
        let mut bxgy = test_promotion("bxgy", PromotionType::BuyXGetY, 9);
        bxgy.buy_qty = Some(3);
        bxgy.get_qty = Some(1);
        let item = CartItem::new("prod-1", 500, 2);

        let line = price_line(&item, &[bxgy, ten_percent("pct")], Utc::now()).unwrap();

        assert_eq!(line.discount_cents, 0);
        assert!(line.promotion_applied.is_none());
    }

    #[test]
    fn test_priced_line_carries_snapshot_and_summary() {
        let item = CartItem::new("prod-1", 1000, 3);
        let now = Utc::now();

        let line = price_line(&item, &[ten_percent("pct")], now).unwrap();

        assert_eq!(line.discount_cents, 300);
        assert_eq!(line.line_total_cents, 2700);
        assert_eq!(line.promotion_id.as_deref(), Some("pct"));
        let snapshot = line.promotion_snapshot.unwrap();
        assert_eq!(snapshot.discount_pct_bps, Some(1000));
        assert_eq!(snapshot.captured_at, now);
        let applied = line.promotion_applied.unwrap();
        assert_eq!(applied.savings.cents(), 300);
        assert_eq!(applied.promotion_type, PromotionType::Percentage);
    }

    #[test]
    fn test_failed_line_keeps_input_and_notes_error() {
        let item = CartItem::new("prod-2", 400, 1);
        let broken = test_promotion("broken", PromotionType::Percentage, 1);

        let err = price_line(&item, &[broken], Utc::now()).unwrap_err();
        let line = PricedLine::failed(&item, &err);

        assert_eq!(line.discount_cents, 0);
        assert_eq!(line.line_total_cents, 400);
        assert!(line.promotion_error.unwrap().contains("broken"));
    }

    #[test]
    fn test_oversized_price_fails_the_line_without_panicking() {
        let item = CartItem::new("prod-2", i64::MAX / 2, 3);

        let err = price_line(&item, &[ten_percent("p")], Utc::now()).unwrap_err();
        let line = PricedLine::failed(&item, &err);

        assert_eq!(line.discount_cents, 0);
        assert!(line.promotion_error.is_some());
    }

    #[test]
    fn test_snapshot_detects_pricing_changes_only() {
        let live = ten_percent("pct");
        let snapshot = PromotionSnapshot::capture(&live, Utc::now());
        assert!(snapshot.matches(&live));

        let mut renamed = live.clone();
        renamed.name = "Renamed".to_string();
        assert!(snapshot.matches(&renamed));

        let mut deeper = live.clone();
        deeper.discount_pct_bps = Some(5000);
        assert!(!snapshot.matches(&deeper));
    }

    #[test]
    fn test_wire_field_names() {
        let line = PricedLine::unpriced(&CartItem::new("prod-1", 250, 4));
        let json = serde_json::to_value(&line).unwrap();

        assert_eq!(json["unitPrice"], 250);
        assert_eq!(json["qty"], 4);
        assert_eq!(json["discount"], 0);
        assert_eq!(json["lineTotal"], 1000);
        assert!(json["promotionId"].is_null());
        assert!(json.get("promotionError").is_none());
    }
}
