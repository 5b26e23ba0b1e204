// ============================================================================
// MERIDIAN COMMERCE - CYCLE COUNT SESSIONS
// ============================================================================
// Module: inventory/src/services/cycle_counts.rs
// Description: Session lifecycle, blind counting, variance reporting and
//              absolute application on completion
// ============================================================================

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use meridian_shared::{Error, RequestContext, Result};

use super::updates::StockUpdateService;
use crate::models::{
    CreateCycleCountRequest, CycleCount, CycleCountSession, CycleCountStatus, CycleCountType,
    StockUpdateOutcome, StockUpdateRequest, StockWrite, VarianceReport, VarianceReportItem,
    VarianceThresholds,
};
use crate::store::InventoryStore;

pub const CYCLE_COUNT_REASON_CODE: &str = "CYCLE_COUNT";

/// Item view handed to counters. Expected quantity is withheld in blind mode.
#[derive(Debug, Clone, Serialize)]
pub struct CycleCountItemView {
    pub sku: String,
    pub expected_quantity: Option<i64>,
}

#[derive(Clone)]
pub struct CycleCountService {
    store: Arc<dyn InventoryStore>,
    updates: StockUpdateService,
    thresholds: VarianceThresholds,
}

impl CycleCountService {
    pub fn new(store: Arc<dyn InventoryStore>, thresholds: VarianceThresholds) -> Self {
        let updates = StockUpdateService::new(store.clone(), thresholds);
        Self {
            store,
            updates,
            thresholds,
        }
    }

    /// FULL sessions load every row in the warehouse; PARTIAL sessions need a
    /// non-empty SKU list. `lock_items` freezes the referenced rows until
    /// completion.
    #[instrument(skip(self, ctx, request), fields(org = %ctx.organization_id))]
    pub async fn create_session(
        &self,
        ctx: &RequestContext,
        request: CreateCycleCountRequest,
    ) -> Result<CycleCountSession> {
        self.store
            .get_warehouse(ctx.organization_id, request.warehouse_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("warehouse {}", request.warehouse_id)))?;

        let item_skus = match request.count_type {
            CycleCountType::Full => self
                .store
                .list_items(ctx.organization_id, request.warehouse_id)
                .await?
                .into_iter()
                .map(|item| item.sku)
                .collect::<Vec<_>>(),
            CycleCountType::Partial => {
                if request.skus.is_empty() {
                    return Err(Error::validation(
                        "skus",
                        "PARTIAL sessions need at least one SKU",
                    ));
                }
                request.skus.clone()
            }
        };

        if request.lock_items {
            self.store
                .set_items_locked(ctx.organization_id, request.warehouse_id, &item_skus, true)
                .await?;
        }

        let session = CycleCountSession {
            id: Uuid::new_v4(),
            organization_id: ctx.organization_id,
            warehouse_id: request.warehouse_id,
            count_type: request.count_type,
            is_blind: request.is_blind,
            lock_items: request.lock_items,
            status: CycleCountStatus::InProgress,
            item_skus,
            counts: Vec::new(),
            created_by: ctx.user_id,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.store.insert_cycle_session(&session).await?;

        info!(session_id = %session.id, count_type = %session.count_type, "cycle count session created");
        Ok(session)
    }

    /// Items for the counting sheet; expected quantities are hidden when the
    /// session is blind.
    pub async fn session_items(
        &self,
        ctx: &RequestContext,
        session_id: Uuid,
    ) -> Result<Vec<CycleCountItemView>> {
        let session = self.require_session(ctx, session_id).await?;

        let mut views = Vec::with_capacity(session.item_skus.len());
        for sku in &session.item_skus {
            let expected = if session.is_blind {
                None
            } else {
                Some(
                    self.store
                        .get_item(ctx.organization_id, session.warehouse_id, sku)
                        .await?
                        .map(|item| item.quantity)
                        .unwrap_or(0),
                )
            };
            views.push(CycleCountItemView {
                sku: sku.clone(),
                expected_quantity: expected,
            });
        }
        Ok(views)
    }

    /// Merge a batch of counts into the session, last write per SKU wins.
    pub async fn submit_counts(
        &self,
        ctx: &RequestContext,
        session_id: Uuid,
        counts: Vec<CycleCount>,
    ) -> Result<CycleCountSession> {
        let mut session = self.require_session(ctx, session_id).await?;
        if session.status != CycleCountStatus::InProgress {
            return Err(Error::InvalidState(format!(
                "session {} is already completed",
                session.id
            )));
        }

        for count in &counts {
            if count.counted_quantity < 0 {
                return Err(Error::validation("counted_quantity", "cannot be negative"));
            }
            if !session.item_skus.contains(&count.sku) {
                return Err(Error::validation(
                    "sku",
                    format!("{} is not part of this session", count.sku),
                ));
            }
        }

        session.merge_counts(counts);
        self.store.update_cycle_session(&session).await?;
        Ok(session)
    }

    /// Apply every submitted count as an absolute update, release any locks
    /// and mark the session completed.
    #[instrument(skip(self, ctx), fields(org = %ctx.organization_id, session_id = %session_id))]
    pub async fn complete(
        &self,
        ctx: &RequestContext,
        session_id: Uuid,
    ) -> Result<(CycleCountSession, Vec<StockUpdateOutcome>)> {
        let mut session = self.require_session(ctx, session_id).await?;
        if session.status != CycleCountStatus::InProgress {
            return Err(Error::InvalidState(format!(
                "session {} is already completed",
                session.id
            )));
        }

        if session.lock_items {
            self.store
                .set_items_locked(
                    ctx.organization_id,
                    session.warehouse_id,
                    &session.item_skus,
                    false,
                )
                .await?;
        }

        let mut outcomes = Vec::with_capacity(session.counts.len());
        for count in &session.counts {
            let outcome = self
                .updates
                .apply(
                    ctx,
                    StockUpdateRequest {
                        warehouse_id: session.warehouse_id,
                        sku: count.sku.clone(),
                        write: StockWrite::Absolute {
                            new_quantity: count.counted_quantity,
                        },
                        reason_code: CYCLE_COUNT_REASON_CODE.to_string(),
                        notes: Some(format!("cycle count session {}", session.id)),
                    },
                )
                .await?;
            outcomes.push(outcome);
        }

        session.status = CycleCountStatus::Completed;
        session.completed_at = Some(Utc::now());
        self.store.update_cycle_session(&session).await?;

        info!(session_id = %session.id, applied = outcomes.len(), "cycle count session completed");
        Ok((session, outcomes))
    }

    /// Current counts vs persisted expected quantities. Available at any time
    /// during or after a session.
    pub async fn variance_report(
        &self,
        ctx: &RequestContext,
        session_id: Uuid,
    ) -> Result<VarianceReport> {
        let session = self.require_session(ctx, session_id).await?;

        let mut items = Vec::with_capacity(session.counts.len());
        let mut total_variance = 0i64;
        let mut absolute_variance = 0i64;
        let mut items_with_variance = 0usize;

        for count in &session.counts {
            let expected = self
                .store
                .get_item(ctx.organization_id, session.warehouse_id, &count.sku)
                .await?
                .map(|item| item.quantity)
                .unwrap_or(0);

            let variance = count.counted_quantity - expected;
            let percent = crate::models::variance_percent(expected, count.counted_quantity);
            if variance != 0 {
                items_with_variance += 1;
            }
            total_variance += variance;
            absolute_variance += variance.abs();

            items.push(VarianceReportItem {
                sku: count.sku.clone(),
                expected,
                counted: count.counted_quantity,
                variance,
                variance_percent: percent,
                variance_level: self.thresholds.level(percent),
            });
        }

        Ok(VarianceReport {
            session_id: session.id,
            total_items: session.counts.len(),
            items_with_variance,
            total_variance,
            absolute_variance,
            items,
        })
    }

    async fn require_session(
        &self,
        ctx: &RequestContext,
        session_id: Uuid,
    ) -> Result<CycleCountSession> {
        self.store
            .get_cycle_session(ctx.organization_id, session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("cycle count session {session_id}")))
    }
}
