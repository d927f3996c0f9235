//! # Promotion Repository
//!
//! Promotion definitions and their product, category and branch links.
//!
//! The repository only fetches candidates: every promotion linked to the
//! product or to its category. Which of them apply, and in what order, is
//! decided by `tillpoint_core::pricing::resolve_applicable`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::pool::begin_write;
use tillpoint_core::pricing::PromotionRule;
use tillpoint_core::validation::{validate_id, validate_name};
use tillpoint_core::{CoreError, Product, Promotion, PromotionScope, PromotionType};

const PROMOTION_COLUMNS: &str = r#"
    id, name, promotion_type, scope, active, priority,
    discount_pct_bps, discount_amount_cents, buy_qty, get_qty,
    created_at, updated_at
"#;

/// Input for a catalog insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPromotion {
    pub id: String,
    pub name: String,
    pub promotion_type: PromotionType,
    pub scope: PromotionScope,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub discount_pct_bps: Option<i64>,
    #[serde(default)]
    pub discount_amount_cents: Option<i64>,
    #[serde(default)]
    pub buy_qty: Option<i64>,
    #[serde(default)]
    pub get_qty: Option<i64>,
    #[serde(default)]
    pub product_ids: Vec<String>,
    #[serde(default)]
    pub category_ids: Vec<String>,
    /// Empty means every branch.
    #[serde(default)]
    pub branch_ids: Vec<String>,
}

impl NewPromotion {
    /// A percentage promotion with no links yet.
    pub fn percentage(id: &str, name: &str, scope: PromotionScope, bps: i64) -> Self {
        NewPromotion {
            id: id.to_string(),
            name: name.to_string(),
            promotion_type: PromotionType::Percentage,
            scope,
            priority: 0,
            discount_pct_bps: Some(bps),
            discount_amount_cents: None,
            buy_qty: None,
            get_qty: None,
            product_ids: Vec::new(),
            category_ids: Vec::new(),
            branch_ids: Vec::new(),
        }
    }

    /// A per-unit fixed amount promotion with no links yet.
    pub fn fixed_amount(id: &str, name: &str, scope: PromotionScope, cents: i64) -> Self {
        NewPromotion {
            promotion_type: PromotionType::FixedAmount,
            discount_pct_bps: None,
            discount_amount_cents: Some(cents),
            ..NewPromotion::percentage(id, name, scope, 0)
        }
    }

    /// A buy-X-get-Y promotion with no links yet.
    pub fn buy_x_get_y(id: &str, name: &str, scope: PromotionScope, buy: i64, get: i64) -> Self {
        NewPromotion {
            promotion_type: PromotionType::BuyXGetY,
            discount_pct_bps: None,
            buy_qty: Some(buy),
            get_qty: Some(get),
            ..NewPromotion::percentage(id, name, scope, 0)
        }
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn products(mut self, ids: &[&str]) -> Self {
        self.product_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn categories(mut self, ids: &[&str]) -> Self {
        self.category_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn branches(mut self, ids: &[&str]) -> Self {
        self.branch_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Inserts a promotion with its links.
    ///
    /// ## Errors
    /// - `InvalidPromotion` when the type-specific fields are wrong, or a
    ///   PRODUCT/CATEGORY promotion has nothing to target
    /// - `ForeignKeyViolation` for links to unknown rows
    pub async fn insert(&self, new: &NewPromotion) -> DbResult<Promotion> {
        validate_id("promotionId", &new.id).map_err(CoreError::from)?;
        validate_name("name", &new.name).map_err(CoreError::from)?;

        let now = Utc::now();
        let promotion = Promotion {
            id: new.id.clone(),
            name: new.name.trim().to_string(),
            promotion_type: new.promotion_type,
            scope: new.scope,
            active: true,
            priority: new.priority,
            discount_pct_bps: new.discount_pct_bps,
            discount_amount_cents: new.discount_amount_cents,
            buy_qty: new.buy_qty,
            get_qty: new.get_qty,
            created_at: now,
            updated_at: now,
        };
        promotion.validate()?;

        let targets_nothing = match new.scope {
            PromotionScope::Product => new.product_ids.is_empty(),
            PromotionScope::Category => new.category_ids.is_empty(),
        };
        if targets_nothing {
            return Err(CoreError::InvalidPromotion {
                promotion_id: new.id.clone(),
                reason: format!("{:?} scope needs at least one target", new.scope),
            }
            .into());
        }

        debug!(id = %promotion.id, kind = %promotion.promotion_type, "Inserting promotion");

        let mut tx = begin_write(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, name, promotion_type, scope, active, priority,
                discount_pct_bps, discount_amount_cents, buy_qty, get_qty,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&promotion.id)
        .bind(&promotion.name)
        .bind(promotion.promotion_type)
        .bind(promotion.scope)
        .bind(promotion.active)
        .bind(promotion.priority)
        .bind(promotion.discount_pct_bps)
        .bind(promotion.discount_amount_cents)
        .bind(promotion.buy_qty)
        .bind(promotion.get_qty)
        .bind(promotion.created_at)
        .bind(promotion.updated_at)
        .execute(&mut *tx)
        .await?;

        for product_id in &new.product_ids {
            sqlx::query("INSERT INTO promotion_products (promotion_id, product_id) VALUES (?1, ?2)")
                .bind(&promotion.id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }
        for category_id in &new.category_ids {
            sqlx::query(
                "INSERT INTO promotion_categories (promotion_id, category_id) VALUES (?1, ?2)",
            )
            .bind(&promotion.id)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
        }
        for branch_id in &new.branch_ids {
            sqlx::query("INSERT INTO promotion_branches (promotion_id, branch_id) VALUES (?1, ?2)")
                .bind(&promotion.id)
                .bind(branch_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(promotion)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Promotion>> {
        let sql = format!("SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = ?1");
        let promotion = sqlx::query_as::<_, Promotion>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(promotion)
    }

    /// Rewrites a promotion's terms. Links are left alone.
    ///
    /// Carts priced before the change carry a snapshot that no longer
    /// matches, so checkout rejects them.
    pub async fn update(&self, promotion: &Promotion) -> DbResult<Promotion> {
        promotion.validate()?;

        let mut updated = promotion.clone();
        updated.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE promotions SET
                name = ?2,
                promotion_type = ?3,
                active = ?4,
                priority = ?5,
                discount_pct_bps = ?6,
                discount_amount_cents = ?7,
                buy_qty = ?8,
                get_qty = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(&updated.id)
        .bind(&updated.name)
        .bind(updated.promotion_type)
        .bind(updated.active)
        .bind(updated.priority)
        .bind(updated.discount_pct_bps)
        .bind(updated.discount_amount_cents)
        .bind(updated.buy_qty)
        .bind(updated.get_qty)
        .bind(updated.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("promotion", &updated.id).into());
        }

        Ok(updated)
    }

    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE promotions SET active = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(active)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("promotion", id).into());
        }
        Ok(())
    }

    /// Writes raw promotion terms, bypassing validation.
    #[cfg(test)]
    pub(crate) async fn corrupt_for_test(&self, id: &str, sql_set: &str) {
        let sql = format!("UPDATE promotions SET {sql_set} WHERE id = ?1");
        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    /// Candidate rules for `product`: linked to it, or to its category.
    /// Inactive promotions are included; the resolver filters them.
    pub(crate) async fn rules_for_product_tx(
        conn: &mut SqliteConnection,
        product: &Product,
    ) -> Result<Vec<PromotionRule>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {PROMOTION_COLUMNS} FROM promotions
            WHERE id IN (SELECT promotion_id FROM promotion_products WHERE product_id = ?1)
               OR id IN (SELECT promotion_id FROM promotion_categories WHERE category_id = ?2)
            ORDER BY created_at, id
            "#
        );
        let promotions = sqlx::query_as::<_, Promotion>(&sql)
            .bind(&product.id)
            .bind(&product.category_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut rules = Vec::with_capacity(promotions.len());
        for promotion in promotions {
            rules.push(Self::load_links(&mut *conn, promotion).await?);
        }
        Ok(rules)
    }

    /// One promotion with its links, for checkout re-validation.
    pub(crate) async fn rule_tx(
        conn: &mut SqliteConnection,
        promotion_id: &str,
    ) -> Result<Option<PromotionRule>, sqlx::Error> {
        let sql = format!("SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = ?1");
        let promotion = sqlx::query_as::<_, Promotion>(&sql)
            .bind(promotion_id)
            .fetch_optional(&mut *conn)
            .await?;

        match promotion {
            Some(promotion) => Ok(Some(Self::load_links(conn, promotion).await?)),
            None => Ok(None),
        }
    }

    async fn load_links(
        conn: &mut SqliteConnection,
        promotion: Promotion,
    ) -> Result<PromotionRule, sqlx::Error> {
        let product_ids: Vec<String> = sqlx::query_scalar(
            "SELECT product_id FROM promotion_products WHERE promotion_id = ?1",
        )
        .bind(&promotion.id)
        .fetch_all(&mut *conn)
        .await?;

        let category_ids: Vec<String> = sqlx::query_scalar(
            "SELECT category_id FROM promotion_categories WHERE promotion_id = ?1",
        )
        .bind(&promotion.id)
        .fetch_all(&mut *conn)
        .await?;

        let branch_ids: Vec<String> = sqlx::query_scalar(
            "SELECT branch_id FROM promotion_branches WHERE promotion_id = ?1",
        )
        .bind(&promotion.id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(PromotionRule {
            promotion,
            product_ids,
            category_ids,
            branch_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_catalog, test_db};
    use crate::DbError;

    #[tokio::test]
    async fn test_insert_and_load_rule() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        db.promotions()
            .insert(
                &NewPromotion::percentage("promo-1", "10% off", PromotionScope::Product, 1000)
                    .products(&[&catalog.cola.id])
                    .branches(&[&catalog.branch.id]),
            )
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let rule = PromotionRepository::rule_tx(&mut conn, "promo-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rule.product_ids, vec![catalog.cola.id.clone()]);
        assert_eq!(rule.branch_ids, vec![catalog.branch.id.clone()]);
        assert!(rule.category_ids.is_empty());
    }

    #[tokio::test]
    async fn test_candidates_include_category_links() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        db.promotions()
            .insert(
                &NewPromotion::fixed_amount("by-cat", "50c off", PromotionScope::Category, 50)
                    .categories(&[&catalog.drinks.id]),
            )
            .await
            .unwrap();
        db.promotions()
            .insert(
                &NewPromotion::percentage("other", "Other", PromotionScope::Product, 500)
                    .products(&[&catalog.chips.id]),
            )
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let rules = PromotionRepository::rules_for_product_tx(&mut conn, &catalog.cola)
            .await
            .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].promotion.id, "by-cat");
    }

    #[tokio::test]
    async fn test_invalid_definitions_are_rejected() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let no_pct = NewPromotion {
            discount_pct_bps: None,
            ..NewPromotion::percentage("p", "P", PromotionScope::Product, 0)
                .products(&[&catalog.cola.id])
        };
        let err = db.promotions().insert(&no_pct).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InvalidPromotion { .. })
        ));

        let no_targets = NewPromotion::buy_x_get_y("b", "B", PromotionScope::Product, 2, 1);
        let err = db.promotions().insert(&no_targets).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InvalidPromotion { .. })
        ));

        assert!(db.promotions().get_by_id("p").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_deactivate() {
        let db = test_db().await;
        let catalog = seed_catalog(&db).await;

        let mut promotion = db
            .promotions()
            .insert(
                &NewPromotion::percentage("promo-1", "10% off", PromotionScope::Product, 1000)
                    .products(&[&catalog.cola.id]),
            )
            .await
            .unwrap();

        promotion.discount_pct_bps = Some(1500);
        db.promotions().update(&promotion).await.unwrap();
        db.promotions().set_active("promo-1", false).await.unwrap();

        let stored = db.promotions().get_by_id("promo-1").await.unwrap().unwrap();
        assert_eq!(stored.discount_pct_bps, Some(1500));
        assert!(!stored.active);
    }
}
