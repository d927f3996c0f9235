//! # Checkout Rules
//!
//! Request shape and the pure arithmetic of a checkout. The transactional
//! half (stock, persistence, loyalty) lives in `tillpoint-db`.
//!
//! ## Totals
//! ```text
//! per line:  gross     = unit × qty
//!            lineTotal = gross − discount          (0 ≤ discount ≤ gross)
//!            tax       = taxAmount ?? round(lineTotal × flat rate)
//!
//! sale:      totalNet   = Σ lineTotal
//!            totalTax   = Σ tax
//!            totalGross = totalNet + totalTax
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::cart::PromotionSnapshot;
use crate::types::{PaymentMethod, TaxRate};
use crate::validation::{
    validate_id, validate_line_amount, validate_line_count, validate_loyalty_points,
    validate_payment_amount, validate_quantity, validate_unit_price,
};

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CheckoutLine {
    pub product_id: String,
    #[serde(rename = "qty")]
    pub quantity: i64,
    #[serde(rename = "unitPrice")]
    pub unit_price_cents: i64,
    #[serde(rename = "discount", default)]
    pub discount_cents: Option<i64>,
    #[serde(rename = "taxAmount", default)]
    pub tax_cents: Option<i64>,
    #[serde(default)]
    pub promotion_id: Option<String>,
    #[serde(default)]
    pub promotion_snapshot: Option<PromotionSnapshot>,
}

impl CheckoutLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        CheckoutLine {
            product_id: product_id.into(),
            quantity,
            unit_price_cents,
            discount_cents: None,
            tax_cents: None,
            promotion_id: None,
            promotion_snapshot: None,
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

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents.unwrap_or(0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    #[serde(rename = "amount")]
    pub amount_cents: i64,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CheckoutRequest {
    pub branch_id: String,
    #[serde(default)]
    pub cashier_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub lines: Vec<CheckoutLine>,
    #[serde(default)]
    pub payments: Vec<PaymentInput>,
    #[serde(default)]
    pub loyalty_points_earned: Option<i64>,
    #[serde(default)]
    pub loyalty_points_used: Option<i64>,
    #[ts(type = "unknown")]
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl CheckoutRequest {
    /// Structural checks only. Stock, promotions and referenced rows are
    /// checked inside the transaction.
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("branchId", &self.branch_id)?;
        if let Some(cashier_id) = &self.cashier_id {
            validate_id("cashierId", cashier_id)?;
        }
        if let Some(customer_id) = &self.customer_id {
            validate_id("customerId", customer_id)?;
        }

        validate_line_count(self.lines.len())?;
        for line in &self.lines {
            validate_id("productId", &line.product_id)?;
            validate_quantity(line.quantity)?;
            validate_unit_price(line.unit_price_cents)?;
            if let Some(discount) = line.discount_cents {
                validate_line_amount("discount", discount)?;
                if discount > line.gross().cents() {
                    return Err(CoreError::DiscountExceedsGross {
                        product_id: line.product_id.clone(),
                        discount,
                        gross: line.gross().cents(),
                    });
                }
            }
            if let Some(tax) = line.tax_cents {
                validate_line_amount("taxAmount", tax)?;
            }
        }

        for payment in &self.payments {
            validate_payment_amount(payment.amount_cents)?;
        }

        validate_loyalty_points("loyaltyPointsEarned", self.loyalty_points_earned.unwrap_or(0))?;
        validate_loyalty_points("loyaltyPointsUsed", self.loyalty_points_used.unwrap_or(0))?;

        Ok(())
    }

    /// Total quantity requested per product across all lines, in product id
    /// order. Stock is checked against these aggregates, and the fixed
    /// order keeps concurrent checkouts touching rows in the same sequence.
    pub fn requested_quantities(&self) -> BTreeMap<&str, i64> {
        let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
        for line in &self.lines {
            *totals.entry(line.product_id.as_str()).or_insert(0) += line.quantity;
        }
        totals
    }

    pub fn payments_total(&self) -> Money {
        self.payments
            .iter()
            .map(|p| Money::from_cents(p.amount_cents))
            .sum()
    }
}

// =============================================================================
// Amounts
// =============================================================================

/// Money amounts of one verified line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub gross: Money,
    pub discount: Money,
    /// `gross − discount`, the persisted line total.
    pub net: Money,
    pub tax: Money,
}

impl LineAmounts {
    /// Builds the amounts for a line whose discount has been verified.
    ///
    /// A submitted `tax` wins; otherwise the flat `rate` applies to the
    /// discounted line total.
    pub fn compute(
        product_id: &str,
        unit_price: Money,
        quantity: i64,
        discount: Money,
        tax: Option<Money>,
        rate: TaxRate,
    ) -> CoreResult<Self> {
        let gross = unit_price.multiply_quantity(quantity);
        if discount > gross {
            return Err(CoreError::DiscountExceedsGross {
                product_id: product_id.to_string(),
                discount: discount.cents(),
                gross: gross.cents(),
            });
        }

        let net = gross - discount;
        let tax = tax.unwrap_or_else(|| net.calculate_tax(rate));

        Ok(LineAmounts {
            gross,
            discount,
            net,
            tax,
        })
    }
}

/// Sale-level totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleTotals {
    pub total_net: Money,
    pub total_tax: Money,
    /// Always `total_net + total_tax`.
    pub total_gross: Money,
    pub total_discount: Money,
}

impl SaleTotals {
    pub fn from_lines(lines: &[LineAmounts]) -> Self {
        let total_net: Money = lines.iter().map(|l| l.net).sum();
        let total_tax: Money = lines.iter().map(|l| l.tax).sum();
        SaleTotals {
            total_net,
            total_tax,
            total_gross: total_net + total_tax,
            total_discount: lines.iter().map(|l| l.discount).sum(),
        }
    }
}

/// Enforces the optional "payments cover the sale" rule.
pub fn check_payment_total(paid: Money, total_gross: Money, enforce: bool) -> CoreResult<()> {
    if enforce && paid < total_gross {
        return Err(CoreError::PaymentShortfall {
            paid: paid.cents(),
            total: total_gross.cents(),
        });
    }
    Ok(())
}

/// Formats a receipt number: `R-YYYYMMDD-HHMMSS-XXXXXX`.
///
/// `entropy` supplies the random suffix (the first six alphanumerics,
/// uppercased). The UNIQUE column is the real guarantee.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use tillpoint_core::checkout::format_receipt_number;
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
/// assert_eq!(format_receipt_number(at, "a1b2c3d4"), "R-20260314-092653-A1B2C3");
/// ```
pub fn format_receipt_number(at: DateTime<Utc>, entropy: &str) -> String {
    let suffix: String = entropy
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect::<String>()
        .to_uppercase();
    format!("R-{}-{}", at.format("%Y%m%d-%H%M%S"), suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================
