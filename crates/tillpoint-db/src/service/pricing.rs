//! # Cart Pricing Service
//!
//! Prices every line of a cart against the live promotion catalog.
//!
//! ## Per-Line Isolation
//! ```text
//! cart: [cola ×3, chips ×2, water ×1]
//!          │          │          │
//!          ▼          ▼          ▼
//!       resolve    resolve    resolve     (product + candidate rules)
//!       select     select ✗   select      (malformed promotion)
//!       discount      │       discount
//!          │          ▼          │
//!          │   zero discount     │
//!          │   + promotionError  │
//!          ▼          ▼          ▼
//!       priced     priced     priced      (input order kept)
//! ```
//!
//! A failure on one line never fails the cart. Prices computed here are a
//! quote: checkout recomputes them from the live promotion.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::repository::product::ProductRepository;
use crate::repository::promotion::PromotionRepository;
use tillpoint_core::pricing::{price_line, resolve_applicable, CartItem, PricedLine};
use tillpoint_core::validation::validate_line_count;
use tillpoint_core::{CoreError, Promotion};

#[derive(Debug, Clone)]
pub struct CartPricingService {
    pool: SqlitePool,
}

impl CartPricingService {
    pub fn new(pool: SqlitePool) -> Self {
        CartPricingService { pool }
    }

    /// Applicable promotions for a product, best precedence first.
    ///
    /// `branch_id` defaults to the product's own branch.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown product
    /// - `ProductInactive` for a product that cannot be sold
    pub async fn resolve(
        &self,
        product_id: &str,
        branch_id: Option<&str>,
    ) -> DbResult<Vec<Promotion>> {
        let mut conn = self.pool.acquire().await?;
        Self::resolve_tx(&mut conn, product_id, branch_id).await
    }

    /// Prices a cart line by line.
    ///
    /// Only a cart that is too large fails as a whole; every per-line
    /// failure becomes a zero-discount line carrying `promotion_error`.
    pub async fn price_cart(
        &self,
        items: &[CartItem],
        branch_id: Option<&str>,
    ) -> DbResult<Vec<PricedLine>> {
        validate_line_count(items.len()).map_err(CoreError::from)?;

        debug!(lines = items.len(), branch_id = ?branch_id, "Pricing cart");

        let mut conn = self.pool.acquire().await?;
        let now = Utc::now();
        let mut priced = Vec::with_capacity(items.len());

        for item in items {
            let line = match Self::price_item(&mut conn, item, branch_id, now).await {
                Ok(line) => line,
                Err(err) => {
                    warn!(
                        product_id = %item.product_id,
                        error = %err,
                        "Line priced without promotion"
                    );
                    PricedLine::failed(item, &err)
                }
            };
            priced.push(line);
        }

        Ok(priced)
    }

    async fn price_item(
        conn: &mut SqliteConnection,
        item: &CartItem,
        branch_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PricedLine, DbError> {
        item.validate()?;
        let candidates = Self::resolve_tx(conn, &item.product_id, branch_id).await?;
        Ok(price_line(item, &candidates, now)?)
    }

    async fn resolve_tx(
        conn: &mut SqliteConnection,
        product_id: &str,
        branch_id: Option<&str>,
    ) -> DbResult<Vec<Promotion>> {
        let product = ProductRepository::require_tx(&mut *conn, product_id).await?;
        let rules = PromotionRepository::rules_for_product_tx(&mut *conn, &product).await?;
        Ok(resolve_applicable(rules, &product, branch_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::promotion::NewPromotion;
    use crate::test_support::{seed_catalog, test_db};
    use chrono::Duration;
    use tillpoint_core::pricing::DiscountDetail;
    use tillpoint_core::{ErrorKind, PromotionScope};

    #[tokio::test]
    async fn test_resolve_orders_by_priority_then_recency() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;
        let cola = catalog.cola.id.as_str();

        db.promotions()
            .insert(&NewPromotion::percentage("low", "Low", PromotionScope::Product, 500).products(&[cola]))
            .await
            .unwrap();
        db.promotions()
            .insert(
                &NewPromotion::percentage("old-high", "Old", PromotionScope::Product, 500)
                    .priority(5)
                    .products(&[cola]),
            )
            .await
            .unwrap();
        db.promotions()
            .insert(
                &NewPromotion::fixed_amount("cat-high", "Cat", PromotionScope::Category, 10)
                    .priority(5)
                    .categories(&[&catalog.drinks.id]),
            )
            .await
            .unwrap();

        // Push "old-high" into the past so the recency tie-break is visible.
        sqlx::query("UPDATE promotions SET created_at = ?2 WHERE id = ?1")
            .bind("old-high")
            .bind(Utc::now() - Duration::days(1))
            .execute(db.pool())
            .await
            .unwrap();

        let ids: Vec<String> = db
            .cart_pricing()
            .resolve(cola, None)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["cat-high", "old-high", "low"]);
    }

    #[tokio::test]
    async fn test_resolve_respects_branch_and_active_flag() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;
        let cola = catalog.cola.id.as_str();

        db.promotions()
            .insert(
                &NewPromotion::percentage("uptown-only", "Uptown", PromotionScope::Product, 1000)
                    .products(&[cola])
                    .branches(&[&catalog.other_branch.id]),
            )
            .await
            .unwrap();
        db.promotions()
            .insert(&NewPromotion::percentage("off", "Off", PromotionScope::Product, 1000).products(&[cola]))
            .await
            .unwrap();
        db.promotions().set_active("off", false).await.unwrap();

        let here = db.cart_pricing().resolve(cola, None).await.unwrap();
        assert!(here.is_empty());

        let there = db
            .cart_pricing()
            .resolve(cola, Some(&catalog.other_branch.id))
            .await
            .unwrap();
        assert_eq!(there.len(), 1);
        assert_eq!(there[0].id, "uptown-only");
    }

    #[tokio::test]
    async fn test_resolve_errors() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let err = db.cart_pricing().resolve("ghost", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        db.products().set_active(&catalog.cola.id, false).await.unwrap();
        let err = db
            .cart_pricing()
            .resolve(&catalog.cola.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::ProductInactive { .. })));
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_price_cart_attaches_best_promotion_and_snapshot() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        db.promotions()
            .insert(
                &NewPromotion::buy_x_get_y("b2g1", "Buy 2 get 1", PromotionScope::Product, 2, 1)
                    .products(&[&catalog.cola.id]),
            )
            .await
            .unwrap();

        let items = vec![
            CartItem::new(catalog.cola.id.clone(), 250, 9),
            CartItem::new(catalog.chips.id.clone(), 199, 2),
        ];
        let priced = db.cart_pricing().price_cart(&items, None).await.unwrap();

        assert_eq!(priced.len(), 2);
        let cola = &priced[0];
        assert_eq!(cola.discount_cents, 750);
        assert_eq!(cola.line_total_cents, 1500);
        assert_eq!(cola.promotion_id.as_deref(), Some("b2g1"));
        assert!(cola.promotion_snapshot.is_some());
        match &cola.promotion_applied.as_ref().unwrap().detail {
            DiscountDetail::BuyXGetY {
                complete_sets,
                free_items,
                paid_items,
                ..
            } => {
                assert_eq!((*complete_sets, *free_items, *paid_items), (3, 3, 6));
            }
            other => panic!("unexpected detail: {other:?}"),
        }

        let chips = &priced[1];
        assert_eq!(chips.discount_cents, 0);
        assert!(chips.promotion_id.is_none());
        assert!(chips.promotion_error.is_none());
    }

    #[tokio::test]
    async fn test_one_bad_line_does_not_spoil_the_cart() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        db.promotions()
            .insert(
                &NewPromotion::percentage("ten", "10%", PromotionScope::Category, 1000)
                    .categories(&[&catalog.drinks.id]),
            )
            .await
            .unwrap();
        db.promotions()
            .insert(
                &NewPromotion::percentage("broken", "Broken", PromotionScope::Product, 2000)
                    .products(&[&catalog.chips.id]),
            )
            .await
            .unwrap();
        db.promotions()
            .corrupt_for_test("broken", "discount_pct_bps = NULL")
            .await;

        let items = vec![
            CartItem::new(catalog.cola.id.clone(), 1000, 2),
            CartItem::new(catalog.chips.id.clone(), 500, 1),
            CartItem::new(catalog.water.id.clone(), 300, 3),
        ];
        let priced = db.cart_pricing().price_cart(&items, None).await.unwrap();

        assert_eq!(priced.len(), 3);
        assert_eq!(priced[0].discount_cents, 200);
        assert_eq!(priced[2].discount_cents, 90);

        assert_eq!(priced[1].discount_cents, 0);
        assert_eq!(priced[1].line_total_cents, 500);
        assert!(priced[1].promotion_id.is_none());
        assert!(priced[1]
            .promotion_error
            .as_deref()
            .unwrap()
            .contains("broken"));
    }

    #[tokio::test]
    async fn test_unknown_inactive_and_oversized_lines_are_line_errors() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;
        db.products().set_active(&catalog.chips.id, false).await.unwrap();

        let items = vec![
            CartItem::new("ghost", 100, 1),
            CartItem::new(catalog.chips.id.clone(), 199, 1),
            CartItem::new(catalog.cola.id.clone(), 250, 0),
            CartItem::new(catalog.water.id.clone(), i64::MAX / 2, 3),
        ];
        let priced = db.cart_pricing().price_cart(&items, None).await.unwrap();

        assert!(priced.iter().all(|line| line.promotion_error.is_some()));
        assert!(priced.iter().all(|line| line.discount_cents == 0));
    }
}
