// ============================================================================
// MERIDIAN COMMERCE - STOCK UPDATE SERVICE
// ============================================================================
// Module: inventory/src/services/updates.rs
// Description: Absolute/delta stock updates with variance classification,
//              approval gating and bulk modes
// ============================================================================

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use meridian_shared::{Error, RequestContext, Result};

use super::audit::AuditLogger;
use crate::models::{
    variance_percent, AuditAction, BulkUpdateItemResult, StockUpdateOutcome, StockUpdateRequest,
    StockWrite, VarianceThresholds,
};
use crate::store::InventoryStore;

#[derive(Clone)]
pub struct StockUpdateService {
    store: Arc<dyn InventoryStore>,
    audit: AuditLogger,
    thresholds: VarianceThresholds,
}

impl StockUpdateService {
    pub fn new(store: Arc<dyn InventoryStore>, thresholds: VarianceThresholds) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self {
            store,
            audit,
            thresholds,
        }
    }

    /// Apply a single update. Updates whose variance exceeds the
    /// auto-approve threshold are returned unapplied with
    /// `requires_approval` set.
    #[instrument(skip(self, ctx, request), fields(org = %ctx.organization_id, sku = %request.sku))]
    pub async fn apply(
        &self,
        ctx: &RequestContext,
        request: StockUpdateRequest,
    ) -> Result<StockUpdateOutcome> {
        if request.reason_code.trim().is_empty() {
            return Err(Error::validation("reason_code", "must not be empty"));
        }

        let previous = self
            .store
            .get_item(ctx.organization_id, request.warehouse_id, &request.sku)
            .await?
            .map(|item| item.quantity)
            .unwrap_or(0);

        let prospective_new = match request.write {
            StockWrite::Absolute { new_quantity } => new_quantity,
            StockWrite::Delta { change } => previous + change,
        };
        let prospective_percent = variance_percent(previous, prospective_new);

        if prospective_percent.abs() > self.thresholds.auto_approve {
            info!(
                sku = %request.sku,
                variance_percent = prospective_percent,
                "update withheld pending approval"
            );
            return Ok(self.outcome(&request, previous, prospective_new, false, true));
        }

        let (actual_previous, actual_new) = self
            .store
            .apply_stock_write(
                ctx.organization_id,
                request.warehouse_id,
                &request.sku,
                request.write,
            )
            .await?;

        let outcome = self.outcome(&request, actual_previous, actual_new, true, false);
        self.record_audit(ctx, &request, &outcome).await;
        Ok(outcome)
    }

    /// All-or-nothing bulk update: every item is gated and validated up
    /// front, then written in one transaction.
    pub async fn apply_bulk_atomic(
        &self,
        ctx: &RequestContext,
        requests: Vec<StockUpdateRequest>,
    ) -> Result<Vec<StockUpdateOutcome>> {
        if requests.is_empty() {
            return Err(Error::validation("updates", "must not be empty"));
        }

        for request in &requests {
            if request.reason_code.trim().is_empty() {
                return Err(Error::validation("reason_code", "must not be empty"));
            }
            let previous = self
                .store
                .get_item(ctx.organization_id, request.warehouse_id, &request.sku)
                .await?
                .map(|item| item.quantity)
                .unwrap_or(0);
            let prospective_new = match request.write {
                StockWrite::Absolute { new_quantity } => new_quantity,
                StockWrite::Delta { change } => previous + change,
            };
            if variance_percent(previous, prospective_new).abs() > self.thresholds.auto_approve {
                return Err(Error::validation(
                    "updates",
                    format!(
                        "update for {} exceeds the auto-approve threshold; atomic batch rejected",
                        request.sku
                    ),
                ));
            }
        }

        let writes: Vec<(Uuid, String, StockWrite)> = requests
            .iter()
            .map(|r| (r.warehouse_id, r.sku.clone(), r.write))
            .collect();
        let results = self
            .store
            .apply_bulk_atomic(ctx.organization_id, &writes)
            .await?;

        let mut outcomes = Vec::with_capacity(requests.len());
        for (request, (previous, new)) in requests.iter().zip(results) {
            let outcome = self.outcome(request, previous, new, true, false);
            self.record_audit(ctx, request, &outcome).await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Best-effort bulk update: continues past failures and reports each
    /// item's result.
    pub async fn apply_bulk_best_effort(
        &self,
        ctx: &RequestContext,
        requests: Vec<StockUpdateRequest>,
    ) -> Result<Vec<BulkUpdateItemResult>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let sku = request.sku.clone();
            match self.apply(ctx, request).await {
                Ok(outcome) => results.push(BulkUpdateItemResult {
                    sku,
                    outcome: Some(outcome),
                    error: None,
                }),
                Err(err) => results.push(BulkUpdateItemResult {
                    sku,
                    outcome: None,
                    error: Some(err.to_string()),
                }),
            }
        }
        Ok(results)
    }

    fn outcome(
        &self,
        request: &StockUpdateRequest,
        previous: i64,
        new: i64,
        applied: bool,
        requires_approval: bool,
    ) -> StockUpdateOutcome {
        let percent = variance_percent(previous, new);
        StockUpdateOutcome {
            warehouse_id: request.warehouse_id,
            sku: request.sku.clone(),
            previous_quantity: previous,
            new_quantity: new,
            variance: new - previous,
            variance_percent: percent,
            variance_level: self.thresholds.level(percent),
            requires_approval,
            applied,
        }
    }

    async fn record_audit(
        &self,
        ctx: &RequestContext,
        request: &StockUpdateRequest,
        outcome: &StockUpdateOutcome,
    ) {
        let action = match request.write {
            StockWrite::Absolute { .. } => AuditAction::AbsoluteUpdate,
            StockWrite::Delta { .. } => AuditAction::DeltaUpdate,
        };
        let mut entry = AuditLogger::entry(
            ctx,
            request.warehouse_id,
            &request.sku,
            action,
            &request.reason_code,
        );
        entry.previous_quantity = Some(outcome.previous_quantity);
        entry.new_quantity = Some(outcome.new_quantity);
        entry.variance = Some(outcome.variance);
        entry.variance_percent = Some(outcome.variance_percent);
        entry.notes = request.notes.clone();
        self.audit.record(entry).await;
    }
}
