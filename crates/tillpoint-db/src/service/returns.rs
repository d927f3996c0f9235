//! # Return Service
//!
//! Creates, corrects and deletes returns, keeping the sale's refunded
//! amount, its status and any restocked units consistent.
//!
//! ## Recompute, Never Patch
//! ```text
//! create  : refunded = Σ existing + new
//! update  : refunded = Σ others   + edited
//! delete  : refunded = Σ survivors
//!
//! status  = from_refunds(refunded, total_gross)
//! ```
//!
//! The sale row is written with a guard on the `refunded_cents` value the
//! sum was computed from. A concurrent return on the same sale changes that
//! value first, so the second writer gets `Conflict` and rolls back instead
//! of overwriting a stale total.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use crate::pool::begin_write;
use crate::repository::product::ProductRepository;
use crate::repository::returns::ReturnRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::stock::{MovementInsert, StockRepository};
use tillpoint_core::refund::{
    parse_reason, remaining_refundable, validate_refund, validate_refund_update, validate_restock,
    RefundSummary, RestockLine, ReturnRequest, ReturnUpdate,
};
use tillpoint_core::{
    CoreError, Money, ReturnReason, Sale, SaleReturn, SaleStatus, StockMovement, StockReason,
};

/// A return together with the sale state it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnOutcome {
    #[serde(rename = "return")]
    pub sale_return: SaleReturn,
    pub sale_status: SaleStatus,
    pub refunded_cents: i64,
    pub remaining_cents: i64,
    pub restocked: Vec<StockMovement>,
}

impl ReturnOutcome {
    fn new(
        sale_return: SaleReturn,
        sale: &Sale,
        summary: RefundSummary,
        restocked: Vec<StockMovement>,
    ) -> Self {
        ReturnOutcome {
            sale_return,
            sale_status: summary.status,
            refunded_cents: summary.refunded.cents(),
            remaining_cents: remaining_refundable(sale.total_gross(), summary.refunded).cents(),
            restocked,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReturnService {
    pool: SqlitePool,
}

impl ReturnService {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnService { pool }
    }

    /// Records a return against a sale.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown sale
    /// - `BadRequest` for a non-positive or over-limit amount, an invalid
    ///   reason, a fully refunded or cancelled sale, or an invalid restock
    /// - `Conflict` when another return on the same sale committed first
    pub async fn create_return(&self, request: ReturnRequest) -> DbResult<ReturnOutcome> {
        let reason = request.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        let outcome = Self::create_return_tx(&mut tx, &request, reason).await?;
        tx.commit().await?;

        info!(
            sale_id = %request.sale_id,
            return_id = %outcome.sale_return.id,
            amount = outcome.sale_return.amount_cents,
            status = %outcome.sale_status,
            restocked = outcome.restocked.len(),
            "Return recorded"
        );

        Ok(outcome)
    }

    /// Changes the amount and/or reason of an existing return.
    ///
    /// A blank reason clears it.
    pub async fn update_return(
        &self,
        return_id: &str,
        update: ReturnUpdate,
    ) -> DbResult<ReturnOutcome> {
        let reason = update
            .reason
            .as_deref()
            .map(|raw| parse_reason(Some(raw)))
            .transpose()?;

        let mut tx = begin_write(&self.pool).await?;

        let existing = ReturnRepository::require_tx(&mut tx, return_id).await?;
        let sale = SaleRepository::require_tx(&mut tx, &existing.sale_id).await?;

        let amount = update
            .amount_cents
            .map(Money::from_cents)
            .unwrap_or(existing.amount());
        let reason = reason.unwrap_or(existing.reason);

        let others = ReturnRepository::amounts_for_sale_tx(&mut tx, &sale.id, Some(return_id)).await?;
        let summary = validate_refund_update(&sale, &others, amount)?;

        ReturnRepository::update_tx(&mut tx, return_id, amount, reason).await?;
        SaleRepository::set_refund_state_tx(&mut tx, &sale.id, sale.refunded_cents, summary).await?;

        let updated = ReturnRepository::require_tx(&mut tx, return_id).await?;
        let restocked = StockRepository::for_return_tx(&mut tx, return_id).await?;
        tx.commit().await?;

        info!(
            return_id = %return_id,
            amount = amount.cents(),
            refunded = summary.refunded.cents(),
            status = %summary.status,
            "Return updated"
        );

        Ok(ReturnOutcome::new(updated, &sale, summary, restocked))
    }

    /// Deletes a return, takes back any units it restocked and re-derives
    /// the sale's refund state from the returns that remain.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown return
    /// - `SaleCancelled` when the sale has been cancelled
    /// - `NegativeStock` when restocked units have since been sold
    pub async fn delete_return(&self, return_id: &str) -> DbResult<Sale> {
        let mut tx = begin_write(&self.pool).await?;

        let existing = ReturnRepository::require_tx(&mut tx, return_id).await?;
        let sale = SaleRepository::require_tx(&mut tx, &existing.sale_id).await?;
        if sale.status == SaleStatus::Cancelled {
            return Err(CoreError::SaleCancelled { sale_id: sale.id }.into());
        }

        for movement in StockRepository::for_return_tx(&mut tx, return_id).await? {
            ProductRepository::apply_stock_change_tx(&mut tx, &movement.product_id, -movement.change)
                .await?;
            StockRepository::delete_tx(&mut tx, &movement.id).await?;
        }

        ReturnRepository::delete_tx(&mut tx, return_id).await?;

        let survivors = ReturnRepository::amounts_for_sale_tx(&mut tx, &sale.id, None).await?;
        let summary = RefundSummary::from_returns(sale.total_gross(), survivors);
        SaleRepository::set_refund_state_tx(&mut tx, &sale.id, sale.refunded_cents, summary).await?;

        let sale = SaleRepository::require_tx(&mut tx, &sale.id).await?;
        tx.commit().await?;

        info!(
            return_id = %return_id,
            sale_id = %sale.id,
            refunded = sale.refunded_cents,
            status = %sale.status,
            "Return deleted"
        );

        Ok(sale)
    }

    async fn create_return_tx(
        conn: &mut SqliteConnection,
        request: &ReturnRequest,
        reason: Option<ReturnReason>,
    ) -> DbResult<ReturnOutcome> {
        let sale = SaleRepository::require_tx(&mut *conn, &request.sale_id).await?;
        let existing = ReturnRepository::amounts_for_sale_tx(&mut *conn, &sale.id, None).await?;
        let summary = validate_refund(&sale, &existing, Money::from_cents(request.amount_cents))?;

        let sale_return = ReturnRepository::insert_tx(
            &mut *conn,
            &sale.id,
            Money::from_cents(request.amount_cents),
            reason,
            request.processed_by.as_deref(),
        )
        .await?;

        let restocked = Self::restock_tx(&mut *conn, &sale, &sale_return.id, &request.restock).await?;

        SaleRepository::set_refund_state_tx(&mut *conn, &sale.id, sale.refunded_cents, summary).await?;

        Ok(ReturnOutcome::new(sale_return, &sale, summary, restocked))
    }

    /// Puts returned units back into stock, one movement per product.
    async fn restock_tx(
        conn: &mut SqliteConnection,
        sale: &Sale,
        return_id: &str,
        lines: &[RestockLine],
    ) -> DbResult<Vec<StockMovement>> {
        let mut requested: BTreeMap<&str, i64> = BTreeMap::new();
        for line in lines {
            *requested.entry(line.product_id.as_str()).or_insert(0) += line.quantity;
        }

        let mut movements = Vec::with_capacity(requested.len());
        for (product_id, quantity) in requested {
            let sold = SaleRepository::quantity_sold_tx(&mut *conn, &sale.id, product_id).await?;
            let already =
                StockRepository::restocked_quantity_tx(&mut *conn, &sale.id, product_id).await?;
            validate_restock(product_id, sold, already, quantity)?;

            debug!(product_id = %product_id, quantity = quantity, "Restocking returned units");

            ProductRepository::apply_stock_change_tx(&mut *conn, product_id, quantity).await?;
            let movement = StockRepository::insert_tx(
                &mut *conn,
                MovementInsert {
                    product_id,
                    branch_id: &sale.branch_id,
                    change: quantity,
                    reason: StockReason::Return,
                    sale_id: Some(&sale.id),
                    return_id: Some(return_id),
                    note: None,
                },
            )
            .await?;
            movements.push(movement);
        }

        Ok(movements)
    }
}
