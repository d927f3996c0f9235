//! # Domain Types
//!
//! Core domain types shared by the pricing engine and the database layer.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Promotion     │   │      Sale       │   │   SaleReturn    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  type / scope   │   │  receipt_number │   │  sale_id (FK)   │       │
//! │  │  priority       │   │  totals (¢)     │   │  amount_cents   │       │
//! │  │  pct / amt / XY │   │  refunded_cents │   │  reason         │       │
//! │  └─────────────────┘   │  status         │   └─────────────────┘       │
//! │                        └────────┬────────┘                              │
//! │  ┌─────────────────┐            │            ┌─────────────────┐       │
//! │  │    Product      │   ┌────────┴────────┐   │ StockMovement   │       │
//! │  │  stock (cache)  │◄──│ SaleLine        │──►│ change (signed) │       │
//! │  │  category_id    │   │ Payment         │   │ reason          │       │
//! │  └─────────────────┘   │ LoyaltyEntry    │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two cached aggregates exist, each backed by an append-only ledger:
//! `Product.stock` (sum of stock movements) and `Customer.loyalty_points`
//! (sum of loyalty entries). Both must change in the same transaction as
//! their ledger rows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::{MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (825 bps = 8.25%).
///
/// Tillpoint applies one flat configured rate; jurisdiction rules are out
/// of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage ("8.25" → 825 bps).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Rate as a percentage, for display only.
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Promotions
// =============================================================================

/// How a promotion computes its discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PromotionType {
    /// `discount_pct_bps` off the line gross.
    Percentage,
    /// `discount_amount_cents` off each unit, capped at the line gross.
    FixedAmount,
    /// Every complete set of `buy_qty + get_qty` units gets `get_qty` free.
    BuyXGetY,
}

impl fmt::Display for PromotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PromotionType::Percentage => "PERCENTAGE",
            PromotionType::FixedAmount => "FIXED_AMOUNT",
            PromotionType::BuyXGetY => "BUY_X_GET_Y",
        };
        f.write_str(s)
    }
}

/// What a promotion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PromotionScope {
    Product,
    Category,
}

/// A promotion definition, as read by the pricing core.
///
/// Exactly the fields required by `promotion_type` are populated; see
/// [`Promotion::validate`]. Percentages are stored in basis points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Promotion {
    pub id: String,
    pub name: String,
    pub promotion_type: PromotionType,
    pub scope: PromotionScope,
    pub active: bool,
    /// Higher wins.
    pub priority: i64,
    /// PERCENTAGE only. 3333 = 33.33%.
    pub discount_pct_bps: Option<i64>,
    /// FIXED_AMOUNT only. Per unit.
    pub discount_amount_cents: Option<i64>,
    /// BUY_X_GET_Y only.
    pub buy_qty: Option<i64>,
    /// BUY_X_GET_Y only.
    pub get_qty: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    /// Checks that the type-specific fields are present and sane.
    ///
    /// ## Rules
    /// ```text
    /// PERCENTAGE    0 < discount_pct_bps <= 10000
    /// FIXED_AMOUNT  discount_amount_cents > 0
    /// BUY_X_GET_Y   buy_qty >= 1 AND get_qty >= 1
    /// ```
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |reason: &str| CoreError::InvalidPromotion {
            promotion_id: self.id.clone(),
            reason: reason.to_string(),
        };

        match self.promotion_type {
            PromotionType::Percentage => match self.discount_pct_bps {
                None => Err(invalid("discount percentage is required")),
                Some(bps) if bps <= 0 || bps > 10_000 => {
                    Err(invalid("discount percentage must be between 0 and 100"))
                }
                Some(_) => Ok(()),
            },
            PromotionType::FixedAmount => match self.discount_amount_cents {
                None => Err(invalid("discount amount is required")),
                Some(amount) if amount <= 0 => Err(invalid("discount amount must be positive")),
                Some(amount) if amount > MAX_AMOUNT_CENTS => {
                    Err(invalid("discount amount is above the maximum amount"))
                }
                Some(_) => Ok(()),
            },
            PromotionType::BuyXGetY => match (self.buy_qty, self.get_qty) {
                (Some(buy), Some(get)) if buy < 1 || get < 1 => {
                    Err(invalid("buy and get quantities must be positive"))
                }
                (Some(buy), Some(get))
                    if buy > MAX_ITEM_QUANTITY || get > MAX_ITEM_QUANTITY =>
                {
                    Err(invalid("buy and get quantities are above the maximum quantity"))
                }
                (Some(_), Some(_)) => Ok(()),
                _ => Err(invalid("buy and get quantities are required")),
            },
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A product, limited to the fields the pricing and checkout core consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub active: bool,
    /// Gross unit price in cents.
    pub price_cents: i64,
    pub branch_id: String,
    pub category_id: Option<String>,
    /// Cached sum of this product's stock movements. Never negative.
    pub stock: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Whether `quantity` units can leave stock without going negative.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

/// Grouping used by CATEGORY-scope promotions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Branch {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A cashier or back-office user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: String,
    pub name: String,
    pub branch_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// Cached sum of this customer's loyalty entries.
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Movements
// =============================================================================

/// Why stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum StockReason {
    Sale,
    Purchase,
    Adjustment,
    Transfer,
    Spoilage,
    Return,
    Damaged,
    Reconciliation,
    InitialStock,
}

impl StockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockReason::Sale => "sale",
            StockReason::Purchase => "purchase",
            StockReason::Adjustment => "adjustment",
            StockReason::Transfer => "transfer",
            StockReason::Spoilage => "spoilage",
            StockReason::Return => "return",
            StockReason::Damaged => "damaged",
            StockReason::Reconciliation => "reconciliation",
            StockReason::InitialStock => "initial_stock",
        }
    }

    /// Reasons owned by checkout, returns and product creation. Manual
    /// movements must use one of the other reasons.
    pub fn is_system_managed(&self) -> bool {
        matches!(
            self,
            StockReason::Sale | StockReason::Return | StockReason::InitialStock
        )
    }
}

/// An immutable stock ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub branch_id: String,
    /// Positive = stock in, negative = stock out.
    pub change: i64,
    pub reason: StockReason,
    /// The sale a sale/return movement belongs to.
    pub sale_id: Option<String>,
    /// The return that restocked these units, if any.
    pub return_id: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sales
// =============================================================================

/// Lifecycle status of a sale.
///
/// After checkout, the status is a pure function of
/// `(refunded_cents, total_gross_cents)`; see [`SaleStatus::from_refunds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum SaleStatus {
    /// Being written inside the checkout transaction. Never visible outside it.
    #[default]
    Pending,
    Completed,
    PartiallyRefunded,
    Refunded,
    /// Administrative cancellation.
    Cancelled,
}

impl SaleStatus {
    /// Derives the refund status of a completed sale.
    ///
    /// ```text
    /// refunded == 0              → COMPLETED
    /// 0 < refunded < total       → PARTIALLY_REFUNDED
    /// refunded >= total          → REFUNDED
    /// ```
    pub fn from_refunds(refunded: Money, total_gross: Money) -> Self {
        if refunded.cents() <= 0 {
            SaleStatus::Completed
        } else if refunded >= total_gross {
            SaleStatus::Refunded
        } else {
            SaleStatus::PartiallyRefunded
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaleStatus::Pending => "PENDING",
            SaleStatus::Completed => "COMPLETED",
            SaleStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
            SaleStatus::Refunded => "REFUNDED",
            SaleStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// A persisted sale.
///
/// ## Invariants
/// - `total_gross_cents = total_net_cents + total_tax_cents`
/// - `refunded_cents <= total_gross_cents`
/// - `status == SaleStatus::from_refunds(refunded, total_gross)` unless
///   the sale is pending or cancelled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub branch_id: String,
    pub cashier_id: Option<String>,
    pub customer_id: Option<String>,
    pub receipt_number: String,
    pub total_gross_cents: i64,
    pub total_net_cents: i64,
    pub total_tax_cents: i64,
    /// Sum of line discounts (informational).
    pub total_discount_cents: i64,
    pub refunded_cents: i64,
    pub status: SaleStatus,
    pub loyalty_points_earned: i64,
    pub loyalty_points_used: i64,
    /// Opaque discount/tax snapshot supplied by the caller.
    #[ts(type = "unknown")]
    pub metadata: Option<serde_json::Value>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total_gross(&self) -> Money {
        Money::from_cents(self.total_gross_cents)
    }

    #[inline]
    pub fn refunded(&self) -> Money {
        Money::from_cents(self.refunded_cents)
    }
}

/// A line of a sale. Immutable once written; corrections go through returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    /// `unit_price × quantity − discount`
    pub line_total_cents: i64,
    pub promotion_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    /// Card payment on an external terminal.
    Card,
    Transfer,
    Voucher,
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    /// Case-insensitive; common card aliases are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" | "external_card" => Ok(PaymentMethod::Card),
            "transfer" | "bank_transfer" => Ok(PaymentMethod::Transfer),
            "voucher" | "gift_card" => Ok(PaymentMethod::Voucher),
            _ => Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: vec![
                    "cash".to_string(),
                    "card".to_string(),
                    "transfer".to_string(),
                    "voucher".to_string(),
                ],
            }),
        }
    }
}

/// A payment towards a sale. Split tender = several payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// External reference (card auth code, etc.).
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Returns
// =============================================================================

/// Why a customer returned goods. Parsed case-insensitively, stored lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReturnReason {
    Defective,
    Damaged,
    WrongItem,
    NotAsDescribed,
    CustomerChangedMind,
    Expired,
    QualityIssue,
    Other,
}

impl ReturnReason {
    pub const ALL: [ReturnReason; 8] = [
        ReturnReason::Defective,
        ReturnReason::Damaged,
        ReturnReason::WrongItem,
        ReturnReason::NotAsDescribed,
        ReturnReason::CustomerChangedMind,
        ReturnReason::Expired,
        ReturnReason::QualityIssue,
        ReturnReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnReason::Defective => "defective",
            ReturnReason::Damaged => "damaged",
            ReturnReason::WrongItem => "wrong_item",
            ReturnReason::NotAsDescribed => "not_as_described",
            ReturnReason::CustomerChangedMind => "customer_changed_mind",
            ReturnReason::Expired => "expired",
            ReturnReason::QualityIssue => "quality_issue",
            ReturnReason::Other => "other",
        }
    }
}

impl FromStr for ReturnReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ReturnReason::ALL
            .iter()
            .copied()
            .find(|reason| reason.as_str() == wanted)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "reason".to_string(),
                allowed: ReturnReason::ALL
                    .iter()
                    .map(|r| r.as_str().to_string())
                    .collect(),
            })
    }
}

/// A refund recorded against a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleReturn {
    pub id: String,
    /// The original transaction.
    pub sale_id: String,
    pub amount_cents: i64,
    pub reason: Option<ReturnReason>,
    pub processed_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SaleReturn {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Loyalty
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LoyaltyKind {
    Earn,
    Redeem,
}

/// Append-only loyalty ledger entry. `points` is signed (+earn, −redeem).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoyaltyEntry {
    pub id: String,
    pub customer_id: String,
    pub sale_id: Option<String>,
    pub kind: LoyaltyKind,
    pub points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn promotion(promotion_type: PromotionType) -> Promotion {
        let now = Utc::now();
        Promotion {
            id: "promo-1".to_string(),
            name: "Test".to_string(),
            promotion_type,
            scope: PromotionScope::Product,
            active: true,
            priority: 0,
            discount_pct_bps: None,
            discount_amount_cents: None,
            buy_qty: None,
            get_qty: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        let rate = TaxRate::from_percentage(8.25);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_status_is_derived_from_refunds() {
        let total = Money::from_cents(10_000);
        assert_eq!(
            SaleStatus::from_refunds(Money::zero(), total),
            SaleStatus::Completed
        );
        assert_eq!(
            SaleStatus::from_refunds(Money::from_cents(1), total),
            SaleStatus::PartiallyRefunded
        );
        assert_eq!(
            SaleStatus::from_refunds(Money::from_cents(9_999), total),
            SaleStatus::PartiallyRefunded
        );
        assert_eq!(
            SaleStatus::from_refunds(total, total),
            SaleStatus::Refunded
        );
    }

    #[test]
    fn test_return_reason_parses_case_insensitively() {
        assert_eq!(
            "DEFECTIVE".parse::<ReturnReason>().unwrap(),
            ReturnReason::Defective
        );
        assert_eq!(
            " Customer_Changed_Mind ".parse::<ReturnReason>().unwrap(),
            ReturnReason::CustomerChangedMind
        );
        assert_eq!(ReturnReason::WrongItem.as_str(), "wrong_item");
        assert!("broken".parse::<ReturnReason>().is_err());
    }

    #[test]
    fn test_payment_method_aliases() {
        assert_eq!("Credit".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_promotion_validate_requires_type_fields() {
        let mut pct = promotion(PromotionType::Percentage);
        assert!(pct.validate().is_err());
        pct.discount_pct_bps = Some(12_000);
        assert!(pct.validate().is_err());
        pct.discount_pct_bps = Some(1_500);
        assert!(pct.validate().is_ok());

        let mut fixed = promotion(PromotionType::FixedAmount);
        assert!(fixed.validate().is_err());
        fixed.discount_amount_cents = Some(0);
        assert!(fixed.validate().is_err());
        fixed.discount_amount_cents = Some(i64::MAX);
        assert!(fixed.validate().is_err());
        fixed.discount_amount_cents = Some(200);
        assert!(fixed.validate().is_ok());

        let mut bxgy = promotion(PromotionType::BuyXGetY);
        bxgy.buy_qty = Some(2);
        assert!(bxgy.validate().is_err());
        bxgy.get_qty = Some(0);
        assert!(bxgy.validate().is_err());
        bxgy.get_qty = Some(i64::MAX);
        assert!(bxgy.validate().is_err());
        bxgy.get_qty = Some(1);
        assert!(bxgy.validate().is_ok());
    }

    #[test]
    fn test_system_managed_reasons() {
        assert!(StockReason::Sale.is_system_managed());
        assert!(StockReason::InitialStock.is_system_managed());
        assert!(!StockReason::Spoilage.is_system_managed());
    }
}
