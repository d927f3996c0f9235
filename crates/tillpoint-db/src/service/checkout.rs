//! # Checkout Service
//!
//! Turns a checkout request into a persisted sale in one transaction.
//!
//! ## Transaction Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. branch, cashier?, customer?          missing → NotFound            │
//! │   2. products (aggregate qty per product) inactive / short → BadRequest │
//! │   3. per line: verify discount, compute net + tax                       │
//! │   4. totals, optional payment coverage                                  │
//! │   5. sale row (PENDING, fresh receipt number)                           │
//! │   6. per line: line row, guarded stock decrement, SALE movement         │
//! │   7. payments                                                           │
//! │   8. loyalty redeem / earn + ledger entries                             │
//! │   9. PENDING → COMPLETED                                                │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any `?` above drops the transaction: nothing is visible afterwards.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::DbResult;
use crate::pool::begin_write;
use crate::repository::branch::{BranchRepository, UserRepository};
use crate::repository::customer::CustomerRepository;
use crate::repository::generate_id;
use crate::repository::product::ProductRepository;
use crate::repository::promotion::PromotionRepository;
use crate::repository::sale::{PaymentInsert, SaleDetails, SaleRepository};
use crate::repository::stock::{MovementInsert, StockRepository};
use tillpoint_core::checkout::{
    check_payment_total, format_receipt_number, CheckoutLine, CheckoutRequest, LineAmounts,
    SaleTotals,
};
use tillpoint_core::pricing::{verify_manual_discount, verify_promoted_discount, SubmittedDiscount};
use tillpoint_core::{
    CoreError, LoyaltyKind, Money, Product, Sale, SaleLine, SaleStatus, StockReason,
};

#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
    config: EngineConfig,
}

impl CheckoutService {
    pub fn new(pool: SqlitePool, config: EngineConfig) -> Self {
        CheckoutService { pool, config }
    }

    /// Persists a sale with its lines, stock movements, payments and
    /// loyalty entries, or nothing at all.
    ///
    /// ## Errors
    /// - `NotFound` for a missing branch, cashier, customer or product
    /// - `BadRequest` for invalid lines, insufficient stock, rejected
    ///   discounts, payment shortfall or insufficient loyalty points
    /// - `Conflict` on a receipt number collision
    pub async fn checkout(&self, request: CheckoutRequest) -> DbResult<SaleDetails> {
        request.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        let details = self.checkout_tx(&mut tx, &request).await?;
        tx.commit().await?;

        info!(
            sale_id = %details.sale.id,
            receipt = %details.sale.receipt_number,
            lines = details.lines.len(),
            total_gross = details.sale.total_gross_cents,
            "Checkout completed"
        );

        Ok(details)
    }

    async fn checkout_tx(
        &self,
        conn: &mut SqliteConnection,
        request: &CheckoutRequest,
    ) -> DbResult<SaleDetails> {
        BranchRepository::require_tx(&mut *conn, &request.branch_id).await?;
        if let Some(cashier_id) = &request.cashier_id {
            UserRepository::require_tx(&mut *conn, cashier_id).await?;
        }
        if let Some(customer_id) = &request.customer_id {
            CustomerRepository::require_tx(&mut *conn, customer_id).await?;
        }

        let products = Self::load_products(&mut *conn, request).await?;

        let mut amounts = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let product = Self::product_for(&products, &line.product_id)?;
            let discount = self
                .verify_discount(&mut *conn, line, product, &request.branch_id)
                .await?;
            amounts.push(LineAmounts::compute(
                &line.product_id,
                line.unit_price(),
                line.quantity,
                discount,
                line.tax_cents.map(Money::from_cents),
                self.config.tax_rate,
            )?);
        }

        let totals = SaleTotals::from_lines(&amounts);
        check_payment_total(
            request.payments_total(),
            totals.total_gross,
            self.config.enforce_payment_total,
        )?;

        let (points_earned, points_used) = match &request.customer_id {
            Some(_) => (
                request.loyalty_points_earned.unwrap_or(0),
                request.loyalty_points_used.unwrap_or(0),
            ),
            None => {
                if request.loyalty_points_earned.unwrap_or(0) > 0
                    || request.loyalty_points_used.unwrap_or(0) > 0
                {
                    warn!("Loyalty points ignored on a sale without a customer");
                }
                (0, 0)
            }
        };

        let now = Utc::now();
        let sale = Sale {
            id: generate_id(),
            branch_id: request.branch_id.clone(),
            cashier_id: request.cashier_id.clone(),
            customer_id: request.customer_id.clone(),
            receipt_number: format_receipt_number(now, &Uuid::new_v4().simple().to_string()),
            total_gross_cents: totals.total_gross.cents(),
            total_net_cents: totals.total_net.cents(),
            total_tax_cents: totals.total_tax.cents(),
            total_discount_cents: totals.total_discount.cents(),
            refunded_cents: 0,
            status: SaleStatus::Pending,
            loyalty_points_earned: points_earned,
            loyalty_points_used: points_used,
            metadata: request.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        SaleRepository::insert_tx(&mut *conn, &sale).await?;

        for (line, amount) in request.lines.iter().zip(&amounts) {
            let product = Self::product_for(&products, &line.product_id)?;

            SaleRepository::insert_line_tx(
                &mut *conn,
                &SaleLine {
                    id: generate_id(),
                    sale_id: sale.id.clone(),
                    product_id: product.id.clone(),
                    name_snapshot: product.name.clone(),
                    unit_price_cents: line.unit_price_cents,
                    quantity: line.quantity,
                    discount_cents: amount.discount.cents(),
                    tax_cents: amount.tax.cents(),
                    line_total_cents: amount.net.cents(),
                    promotion_id: line.promotion_id.clone(),
                    created_at: now,
                },
            )
            .await?;

            ProductRepository::decrement_for_sale_tx(&mut *conn, product, line.quantity).await?;
            StockRepository::insert_tx(
                &mut *conn,
                MovementInsert {
                    product_id: &product.id,
                    branch_id: &sale.branch_id,
                    change: -line.quantity,
                    reason: StockReason::Sale,
                    sale_id: Some(&sale.id),
                    return_id: None,
                    note: None,
                },
            )
            .await?;
        }

        for payment in &request.payments {
            SaleRepository::insert_payment_tx(
                &mut *conn,
                &sale.id,
                PaymentInsert {
                    method: payment.method,
                    amount_cents: payment.amount_cents,
                    reference: payment.reference.as_deref(),
                },
            )
            .await?;
        }

        if let Some(customer_id) = &sale.customer_id {
            // Redeem first so points earned on this sale cannot fund it.
            if points_used > 0 {
                CustomerRepository::apply_points_tx(
                    &mut *conn,
                    customer_id,
                    Some(&sale.id),
                    LoyaltyKind::Redeem,
                    points_used,
                )
                .await?;
            }
            if points_earned > 0 {
                CustomerRepository::apply_points_tx(
                    &mut *conn,
                    customer_id,
                    Some(&sale.id),
                    LoyaltyKind::Earn,
                    points_earned,
                )
                .await?;
            }
        }

        SaleRepository::mark_completed_tx(&mut *conn, &sale.id).await?;
        SaleRepository::details_tx(&mut *conn, &sale.id).await
    }

    /// Loads every product on the request and checks it can cover the
    /// total quantity asked for across all of its lines.
    async fn load_products(
        conn: &mut SqliteConnection,
        request: &CheckoutRequest,
    ) -> DbResult<BTreeMap<String, Product>> {
        let mut products = BTreeMap::new();

        for (product_id, requested) in request.requested_quantities() {
            let product = ProductRepository::require_tx(&mut *conn, product_id).await?;

            if !product.active {
                return Err(CoreError::ProductInactive {
                    product_id: product.id,
                }
                .into());
            }

            if !product.can_sell(requested) {
                return Err(CoreError::InsufficientStock {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    available: product.stock,
                    requested,
                }
                .into());
            }

            products.insert(product.id.clone(), product);
        }

        Ok(products)
    }

    fn product_for<'a>(
        products: &'a BTreeMap<String, Product>,
        product_id: &str,
    ) -> DbResult<&'a Product> {
        Ok(products
            .get(product_id)
            .ok_or_else(|| CoreError::not_found("product", product_id))?)
    }

    /// Returns the discount to persist for one line.
    async fn verify_discount(
        &self,
        conn: &mut SqliteConnection,
        line: &CheckoutLine,
        product: &Product,
        branch_id: &str,
    ) -> DbResult<Money> {
        let submitted = SubmittedDiscount {
            product_id: &line.product_id,
            unit_price: line.unit_price(),
            quantity: line.quantity,
            discount: line.discount(),
        };

        let Some(promotion_id) = &line.promotion_id else {
            return Ok(verify_manual_discount(
                submitted,
                self.config.allow_manual_discounts,
            )?);
        };

        let Some(rule) = PromotionRepository::rule_tx(&mut *conn, promotion_id).await? else {
            return Err(CoreError::PromotionNotApplicable {
                promotion_id: promotion_id.clone(),
                product_id: line.product_id.clone(),
            }
            .into());
        };

        let applicable = rule.applies_to(product, branch_id);
        let verified = verify_promoted_discount(
            submitted,
            &rule.promotion,
            applicable,
            line.promotion_snapshot.as_ref(),
            self.config.discount_tolerance,
        );

        match verified {
            Ok(discount) => {
                debug!(
                    product_id = %line.product_id,
                    promotion_id = %promotion_id,
                    discount = discount.cents(),
                    "Promotion discount verified"
                );
                Ok(discount)
            }
            Err(err) => {
                warn!(
                    product_id = %line.product_id,
                    promotion_id = %promotion_id,
                    error = %err,
                    "Promotion discount rejected"
                );
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::promotion::NewPromotion;
    use crate::test_support::{file_db, seed_catalog, simple_checkout, test_db, Catalog};
    use crate::DbError;
    use tillpoint_core::checkout::PaymentInput;
    use tillpoint_core::pricing::CartItem;
    use tillpoint_core::{ErrorKind, PaymentMethod, PromotionScope, TaxRate};

    fn cash(amount_cents: i64) -> PaymentInput {
        PaymentInput {
            method: PaymentMethod::Cash,
            amount_cents,
            reference: None,
        }
    }

    fn request(catalog: &Catalog, lines: Vec<CheckoutLine>) -> CheckoutRequest {
        CheckoutRequest {
            branch_id: catalog.branch.id.clone(),
            cashier_id: Some(catalog.cashier.id.clone()),
            customer_id: None,
            lines,
            payments: vec![],
            loyalty_points_earned: None,
            loyalty_points_used: None,
            metadata: None,
        }
    }

    async fn stock_of(db: &crate::Database, product_id: &str) -> i64 {
        db.products()
            .get_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    #[tokio::test]
    async fn test_checkout_persists_sale_and_decrements_stock() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let details = db
            .checkout()
            .checkout(simple_checkout(&catalog, 3))
            .await
            .unwrap();

        assert_eq!(details.sale.status, SaleStatus::Completed);
        assert!(details.sale.receipt_number.starts_with("R-"));
        assert_eq!(details.lines.len(), 1);
        assert_eq!(details.lines[0].name_snapshot, catalog.cola.name);
        assert_eq!(details.payments.len(), 1);
        assert_eq!(
            details.sale.total_gross_cents,
            details.sale.total_net_cents + details.sale.total_tax_cents
        );

        assert_eq!(stock_of(&db, &catalog.cola.id).await, catalog.cola.stock - 3);

        let movements = db
            .stock_movements()
            .list_for_sale(&details.sale.id)
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].change, -3);
        assert_eq!(movements[0].reason, StockReason::Sale);
        assert_eq!(movements[0].branch_id, catalog.branch.id);

        let report = db.stock_movements().reconcile(&catalog.cola.id).await.unwrap();
        assert!(report.in_sync);
    }

    #[tokio::test]
    async fn test_overdraw_is_rejected_and_stock_unchanged() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let err = db
            .checkout()
            .checkout(simple_checkout(&catalog, catalog.cola.stock + 1))
            .await
            .unwrap_err();
        match &err {
            DbError::Core(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(*available, catalog.cola.stock);
                assert_eq!(*requested, catalog.cola.stock + 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.to_response().details.unwrap()["currentStock"], 10);

        assert_eq!(stock_of(&db, &catalog.cola.id).await, catalog.cola.stock);
        assert_eq!(db.sales().count().await.unwrap(), 0);

        // Selling exactly what is left is fine and leaves zero.
        db.checkout()
            .checkout(simple_checkout(&catalog, catalog.cola.stock))
            .await
            .unwrap();
        assert_eq!(stock_of(&db, &catalog.cola.id).await, 0);

        let err = db
            .checkout()
            .checkout(simple_checkout(&catalog, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { .. })));
    }

    #[tokio::test]
    async fn test_failing_middle_line_rolls_back_everything() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let mut req = request(
            &catalog,
            vec![
                CheckoutLine::new(catalog.cola.id.clone(), 2, catalog.cola.price_cents),
                CheckoutLine::new(catalog.chips.id.clone(), catalog.chips.stock + 5, catalog.chips.price_cents),
                CheckoutLine::new(catalog.water.id.clone(), 1, catalog.water.price_cents),
            ],
        );
        req.payments = vec![cash(10_000)];

        let err = db.checkout().checkout(req).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { .. })));

        assert_eq!(db.sales().count().await.unwrap(), 0);
        for product in [&catalog.cola, &catalog.chips, &catalog.water] {
            assert_eq!(stock_of(&db, &product.id).await, product.stock);
            let movements = db
                .stock_movements()
                .list_for_product(&product.id)
                .await
                .unwrap();
            assert!(movements.iter().all(|m| m.reason == StockReason::InitialStock));
        }
    }

    #[tokio::test]
    async fn test_failure_after_writes_rolls_back_everything() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        // The redemption fails after the sale, lines, stock and payments
        // were written on the transaction.
        let mut req = simple_checkout(&catalog, 2);
        req.customer_id = Some(catalog.customer.id.clone());
        req.loyalty_points_used = Some(1_000);

        let err = db.checkout().checkout(req).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientLoyaltyPoints { .. })
        ));

        assert_eq!(db.sales().count().await.unwrap(), 0);
        assert_eq!(stock_of(&db, &catalog.cola.id).await, catalog.cola.stock);
        assert!(db
            .stock_movements()
            .reconcile(&catalog.cola.id)
            .await
            .unwrap()
            .in_sync);
        assert!(db.customers().ledger(&catalog.customer.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stock_is_checked_across_duplicate_lines() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let req = request(
            &catalog,
            vec![
                CheckoutLine::new(catalog.cola.id.clone(), 6, catalog.cola.price_cents),
                CheckoutLine::new(catalog.cola.id.clone(), 5, catalog.cola.price_cents),
            ],
        );
        let err = db.checkout().checkout(req).await.unwrap_err();
        match err {
            DbError::Core(CoreError::InsufficientStock { requested, .. }) => {
                assert_eq!(requested, 11)
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let req = request(
            &catalog,
            vec![
                CheckoutLine::new(catalog.cola.id.clone(), 6, catalog.cola.price_cents),
                CheckoutLine::new(catalog.cola.id.clone(), 4, catalog.cola.price_cents),
            ],
        );
        let details = db.checkout().checkout(req).await.unwrap();
        assert_eq!(details.lines.len(), 2);
        assert_eq!(stock_of(&db, &catalog.cola.id).await, 0);
        assert!(db
            .stock_movements()
            .reconcile(&catalog.cola.id)
            .await
            .unwrap()
            .in_sync);
    }

    #[tokio::test]
    async fn test_missing_references_are_not_found() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let mut req = simple_checkout(&catalog, 1);
        req.branch_id = "ghost".to_string();
        assert_eq!(
            db.checkout().checkout(req).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let mut req = simple_checkout(&catalog, 1);
        req.cashier_id = Some("ghost".to_string());
        assert_eq!(
            db.checkout().checkout(req).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let mut req = simple_checkout(&catalog, 1);
        req.customer_id = Some("ghost".to_string());
        assert_eq!(
            db.checkout().checkout(req).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let req = request(&catalog, vec![CheckoutLine::new("ghost", 1, 100)]);
        assert_eq!(
            db.checkout().checkout(req).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );

        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_structural_errors_are_bad_requests() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let req = request(&catalog, vec![]);
        assert_eq!(
            db.checkout().checkout(req).await.unwrap_err().kind(),
            ErrorKind::BadRequest
        );

        let req = request(
            &catalog,
            vec![CheckoutLine::new(catalog.cola.id.clone(), 0, 250)],
        );
        assert_eq!(
            db.checkout().checkout(req).await.unwrap_err().kind(),
            ErrorKind::BadRequest
        );

        db.products().set_active(&catalog.cola.id, false).await.unwrap();
        let err = db
            .checkout()
            .checkout(simple_checkout(&catalog, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::ProductInactive { .. })));
    }

    #[tokio::test]
    async fn test_priced_cart_passes_verification() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        db.promotions()
            .insert(
                &NewPromotion::percentage("ten", "10% off", PromotionScope::Product, 1000)
                    .products(&[&catalog.cola.id]),
            )
            .await
            .unwrap();

        let priced = db
            .cart_pricing()
            .price_cart(&[CartItem::new(catalog.cola.id.clone(), 250, 3)], None)
            .await
            .unwrap();
        let quote = &priced[0];
        assert_eq!(quote.discount_cents, 75);

        let mut line = CheckoutLine::new(catalog.cola.id.clone(), 3, 250);
        // One cent of drift is inside the default tolerance.
        line.discount_cents = Some(quote.discount_cents + 1);
        line.promotion_id = quote.promotion_id.clone();
        line.promotion_snapshot = quote.promotion_snapshot.clone();

        let details = db
            .checkout()
            .checkout(request(&catalog, vec![line]))
            .await
            .unwrap();
        assert_eq!(details.lines[0].discount_cents, 75);
        assert_eq!(details.lines[0].line_total_cents, 675);
        assert_eq!(details.lines[0].promotion_id.as_deref(), Some("ten"));
        assert_eq!(details.sale.total_discount_cents, 75);
    }

    #[tokio::test]
    async fn test_tampered_discount_is_rejected() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        db.promotions()
            .insert(
                &NewPromotion::percentage("ten", "10% off", PromotionScope::Product, 1000)
                    .products(&[&catalog.cola.id]),
            )
            .await
            .unwrap();

        let mut line = CheckoutLine::new(catalog.cola.id.clone(), 2, 250);
        line.discount_cents = Some(250);
        line.promotion_id = Some("ten".to_string());

        let err = db
            .checkout()
            .checkout(request(&catalog, vec![line]))
            .await
            .unwrap_err();
        match &err {
            DbError::Core(CoreError::DiscountMismatch {
                submitted,
                expected,
                ..
            }) => {
                assert_eq!(*submitted, 250);
                assert_eq!(*expected, 50);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_changed_or_inapplicable_promotion_is_rejected() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        db.promotions()
            .insert(
                &NewPromotion::percentage("ten", "10% off", PromotionScope::Product, 1000)
                    .products(&[&catalog.cola.id]),
            )
            .await
            .unwrap();

        let priced = db
            .cart_pricing()
            .price_cart(&[CartItem::new(catalog.cola.id.clone(), 250, 2)], None)
            .await
            .unwrap();

        let mut promotion = db.promotions().get_by_id("ten").await.unwrap().unwrap();
        promotion.discount_pct_bps = Some(2000);
        db.promotions().update(&promotion).await.unwrap();

        let mut line = CheckoutLine::new(catalog.cola.id.clone(), 2, 250);
        line.discount_cents = Some(priced[0].discount_cents);
        line.promotion_id = priced[0].promotion_id.clone();
        line.promotion_snapshot = priced[0].promotion_snapshot.clone();

        let err = db
            .checkout()
            .checkout(request(&catalog, vec![line.clone()]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::PromotionChanged { .. })));

        db.promotions().set_active("ten", false).await.unwrap();
        line.promotion_snapshot = None;
        let err = db
            .checkout()
            .checkout(request(&catalog, vec![line.clone()]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::PromotionNotApplicable { .. })
        ));

        line.promotion_id = Some("ghost".to_string());
        let err = db
            .checkout()
            .checkout(request(&catalog, vec![line]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::PromotionNotApplicable { .. })
        ));
    }

    #[tokio::test]
    async fn test_manual_discounts_follow_config() {
        let mut db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let mut line = CheckoutLine::new(catalog.cola.id.clone(), 2, 250);
        line.discount_cents = Some(100);

        let details = db
            .checkout()
            .checkout(request(&catalog, vec![line.clone()]))
            .await
            .unwrap();
        assert_eq!(details.lines[0].discount_cents, 100);
        assert_eq!(details.lines[0].line_total_cents, 400);

        db.set_engine(EngineConfig {
            allow_manual_discounts: false,
            ..EngineConfig::default()
        });
        let err = db
            .checkout()
            .checkout(request(&catalog, vec![line]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::ManualDiscountNotAllowed { .. })
        ));
    }

    #[tokio::test]
    async fn test_flat_tax_applies_when_line_has_none() {
        let mut db = test_db().await;
        let catalog = seed_catalog(&db).await;
        db.set_engine(EngineConfig {
            tax_rate: TaxRate::from_bps(1000),
            ..EngineConfig::default()
        });

        let mut taxed = CheckoutLine::new(catalog.chips.id.clone(), 1, 199);
        taxed.tax_cents = Some(7);

        let details = db
            .checkout()
            .checkout(request(
                &catalog,
                vec![CheckoutLine::new(catalog.cola.id.clone(), 2, 250), taxed],
            ))
            .await
            .unwrap();

        assert_eq!(details.lines[0].tax_cents, 50);
        assert_eq!(details.lines[1].tax_cents, 7);
        assert_eq!(details.sale.total_net_cents, 699);
        assert_eq!(details.sale.total_tax_cents, 57);
        assert_eq!(details.sale.total_gross_cents, 756);
    }

    #[tokio::test]
    async fn test_payment_total_is_enforced_when_configured() {
        let mut db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let mut req = request(
            &catalog,
            vec![CheckoutLine::new(catalog.cola.id.clone(), 2, 250)],
        );
        req.payments = vec![cash(200), cash(100)];

        // Off by default: short payment is recorded as given.
        let details = db.checkout().checkout(req.clone()).await.unwrap();
        assert_eq!(details.payments.len(), 2);

        db.set_engine(EngineConfig {
            enforce_payment_total: true,
            ..EngineConfig::default()
        });
        let err = db.checkout().checkout(req.clone()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::PaymentShortfall { .. })));

        req.payments.push(cash(200));
        db.checkout().checkout(req).await.unwrap();
    }

    #[tokio::test]
    async fn test_loyalty_balance_and_ledger_move_together() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;
        db.customers().grant_points(&catalog.customer.id, 100).await.unwrap();

        let mut req = simple_checkout(&catalog, 1);
        req.customer_id = Some(catalog.customer.id.clone());
        req.loyalty_points_used = Some(30);
        req.loyalty_points_earned = Some(5);

        let details = db.checkout().checkout(req).await.unwrap();
        assert_eq!(details.sale.loyalty_points_used, 30);
        assert_eq!(details.sale.loyalty_points_earned, 5);

        let customer = db
            .customers()
            .get_by_id(&catalog.customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.loyalty_points, 75);
        assert_eq!(
            db.customers().ledger_total(&catalog.customer.id).await.unwrap(),
            75
        );

        let ledger = db.customers().ledger(&catalog.customer.id).await.unwrap();
        let for_sale: Vec<i64> = ledger
            .iter()
            .filter(|e| e.sale_id.as_deref() == Some(details.sale.id.as_str()))
            .map(|e| e.points)
            .collect();
        assert_eq!(for_sale, vec![-30, 5]);
    }

    #[tokio::test]
    async fn test_loyalty_without_customer_is_ignored() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let mut req = simple_checkout(&catalog, 1);
        req.loyalty_points_earned = Some(10);

        let details = db.checkout().checkout(req).await.unwrap();
        assert_eq!(details.sale.loyalty_points_earned, 0);
        assert_eq!(details.sale.loyalty_points_used, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_cannot_oversell() {
        let (_dir, db) = file_db().await;
        let catalog = seed_catalog(&db).await;
        let (a, b) = (db.checkout(), db.checkout());

        let (first, second) = tokio::join!(
            a.checkout(simple_checkout(&catalog, 6)),
            b.checkout(simple_checkout(&catalog, 6)),
        );

        let lost = match (first, second) {
            (Ok(_), Err(lost)) | (Err(lost), Ok(_)) => lost,
            other => panic!("expected one sale, got {other:?}"),
        };
        assert!(matches!(
            lost,
            DbError::Core(CoreError::InsufficientStock { available: 4, requested: 6, .. })
        ));

        let cola = db.products().get_by_id(&catalog.cola.id).await.unwrap().unwrap();
        assert_eq!(cola.stock, 4);
        assert!(db.stock_movements().reconcile(&cola.id).await.unwrap().in_sync);
    }
}
