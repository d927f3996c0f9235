//! # Stock Service
//!
//! Manual stock movements: deliveries, counts, spoilage and the like.
//!
//! Sale, return and initial-stock movements belong to checkout, returns and
//! product creation; they cannot be recorded or deleted here. Every change
//! goes through the same guarded update as checkout, so stock never drops
//! below zero and the ledger always sums to the cached value.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::pool::begin_write;
use crate::repository::product::ProductRepository;
use crate::repository::stock::{MovementInsert, StockRepository};
use tillpoint_core::validation::validate_id;
use tillpoint_core::{CoreError, StockMovement, StockReason, ValidationError};

/// Reasons accepted for manual movements.
const MANUAL_REASONS: [StockReason; 6] = [
    StockReason::Purchase,
    StockReason::Adjustment,
    StockReason::Transfer,
    StockReason::Spoilage,
    StockReason::Damaged,
    StockReason::Reconciliation,
];

/// A manual stock change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMovement {
    pub product_id: String,
    /// Positive = stock in, negative = stock out.
    pub change: i64,
    pub reason: StockReason,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StockService {
    pool: SqlitePool,
}

impl StockService {
    pub fn new(pool: SqlitePool) -> Self {
        StockService { pool }
    }

    /// Applies a manual change and records it in the ledger.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown product
    /// - `Validation` for a zero change or a system-managed reason
    /// - `NegativeStock` when the change would take stock below zero
    pub async fn record_movement(&self, movement: &NewMovement) -> DbResult<StockMovement> {
        validate_id("productId", &movement.product_id).map_err(CoreError::from)?;
        if movement.change == 0 {
            return Err(CoreError::from(ValidationError::InvalidFormat {
                field: "change".to_string(),
                reason: "must not be zero".to_string(),
            })
            .into());
        }
        ensure_manual(movement.reason)?;

        let mut tx = begin_write(&self.pool).await?;

        let product = ProductRepository::require_tx(&mut tx, &movement.product_id).await?;
        let stock =
            ProductRepository::apply_stock_change_tx(&mut tx, &product.id, movement.change).await?;
        let recorded = StockRepository::insert_tx(
            &mut tx,
            MovementInsert {
                product_id: &product.id,
                branch_id: &product.branch_id,
                change: movement.change,
                reason: movement.reason,
                sale_id: None,
                return_id: None,
                note: movement.note.as_deref(),
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product.id,
            change = movement.change,
            reason = ?movement.reason,
            stock = stock,
            "Stock movement recorded"
        );

        Ok(recorded)
    }

    /// Removes a manual movement and reverses its effect on stock.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown movement
    /// - `Validation` for a sale, return or initial-stock movement
    /// - `NegativeStock` when the units it added have since left stock
    pub async fn delete_movement(&self, id: &str) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;

        let movement = StockRepository::find_tx(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::not_found("stock movement", id))?;
        ensure_manual(movement.reason)?;

        let stock =
            ProductRepository::apply_stock_change_tx(&mut tx, &movement.product_id, -movement.change)
                .await?;
        StockRepository::delete_tx(&mut tx, id).await?;

        tx.commit().await?;

        info!(
            movement_id = %id,
            product_id = %movement.product_id,
            stock = stock,
            "Stock movement deleted"
        );

        Ok(())
    }
}

fn ensure_manual(reason: StockReason) -> Result<(), CoreError> {
    if reason.is_system_managed() {
        return Err(ValidationError::NotAllowed {
            field: "reason".to_string(),
            allowed: MANUAL_REASONS
                .iter()
                .map(|r| r.as_str().to_string())
                .collect(),
        }
        .into());
    }
    Ok(())
}
