// ============================================================================
// MERIDIAN COMMERCE - STOCK MOVEMENT SERVICE
// ============================================================================
// Module: inventory/src/services/movements.rs
// Description: Movement validation, creation, execution and cancellation
// ============================================================================

use std::sync::Arc;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use tracing::{info, instrument};
use uuid::Uuid;

use meridian_shared::events::{names, DomainEvent, EventPublisher};
use meridian_shared::types::{PageRequest, PageResponse};
use meridian_shared::{Error, RequestContext, Result};

use super::audit::AuditLogger;
use crate::models::{
    AuditAction, CreateMovementRequest, InventoryItem, MovementDirection, MovementFilter,
    MovementStats, MovementStatus, MovementType, StockMovement, MAX_MOVEMENT_QUANTITY,
    MIN_MOVEMENT_QUANTITY,
};
use crate::store::InventoryStore;

/// Movement approval is configurable but not wired to any approver flow;
/// the default permits direct execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementPolicy {
    pub approval_required: bool,
}

#[derive(Clone)]
pub struct MovementService {
    store: Arc<dyn InventoryStore>,
    publisher: Arc<dyn EventPublisher>,
    audit: AuditLogger,
    policy: MovementPolicy,
}

/// Strip script blocks first so their contents go with them, then any
/// remaining markup.
pub fn sanitize_reason(reason: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static TAGS: OnceLock<Regex> = OnceLock::new();

    let script = SCRIPT
        .get_or_init(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("static regex"));
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"));

    let without_scripts = script.replace_all(reason, "");
    tags.replace_all(&without_scripts, "").trim().to_string()
}

impl MovementService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        publisher: Arc<dyn EventPublisher>,
        policy: MovementPolicy,
    ) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self {
            store,
            publisher,
            audit,
            policy,
        }
    }

    /// Validate and persist a movement in PENDING state.
    ///
    /// TRANSFER_OUT requests produce the linked TRANSFER_OUT / TRANSFER_IN
    /// pair and return the outbound half; TRANSFER_IN cannot be created
    /// directly.
    #[instrument(skip(self, ctx, request), fields(org = %ctx.organization_id))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        request: CreateMovementRequest,
    ) -> Result<StockMovement> {
        if request.quantity < MIN_MOVEMENT_QUANTITY || request.quantity > MAX_MOVEMENT_QUANTITY {
            return Err(Error::validation(
                "quantity",
                format!("must be between {MIN_MOVEMENT_QUANTITY} and {MAX_MOVEMENT_QUANTITY}"),
            ));
        }

        let reason = sanitize_reason(&request.reason);
        if reason.is_empty() {
            return Err(Error::validation("reason", "must not be empty"));
        }

        if request.movement_type == MovementType::TransferIn {
            return Err(Error::validation(
                "type",
                "TRANSFER_IN movements are created through their TRANSFER_OUT pair",
            ));
        }

        self.require_warehouse(ctx, request.warehouse_id).await?;

        if request.movement_type.direction() == MovementDirection::Outbound {
            let item = self
                .store
                .get_item(ctx.organization_id, request.warehouse_id, &request.sku)
                .await?
                .ok_or_else(|| Error::NotFound(format!("inventory row for {}", request.sku)))?;

            if request.quantity > item.available() {
                return Err(Error::InsufficientStock {
                    sku: request.sku.clone(),
                    requested: request.quantity,
                    available: item.available(),
                });
            }
        }

        if request.movement_type == MovementType::TransferOut {
            return self.create_transfer_pair(ctx, request, reason).await;
        }

        let movement = self.build_movement(ctx, &request, reason, None);
        self.store.insert_movement(&movement).await?;

        info!(movement_id = %movement.id, movement_type = %movement.movement_type, "movement created");
        Ok(movement)
    }

    async fn create_transfer_pair(
        &self,
        ctx: &RequestContext,
        request: CreateMovementRequest,
        reason: String,
    ) -> Result<StockMovement> {
        let target_warehouse_id = request.target_warehouse_id.ok_or_else(|| {
            Error::validation("target_warehouse_id", "required for TRANSFER_OUT")
        })?;
        if target_warehouse_id == request.warehouse_id {
            return Err(Error::validation(
                "target_warehouse_id",
                "source and target warehouses must differ",
            ));
        }
        self.require_warehouse(ctx, target_warehouse_id).await?;

        let mut outbound = self.build_movement(ctx, &request, reason.clone(), None);
        let inbound_request = CreateMovementRequest {
            warehouse_id: target_warehouse_id,
            movement_type: MovementType::TransferIn,
            target_warehouse_id: None,
            ..request
        };
        let mut inbound = self.build_movement(ctx, &inbound_request, reason, None);

        outbound.linked_movement_id = Some(inbound.id);
        inbound.linked_movement_id = Some(outbound.id);

        self.store.insert_movement_pair(&outbound, &inbound).await?;

        info!(
            outbound_id = %outbound.id,
            inbound_id = %inbound.id,
            "transfer movement pair created"
        );
        Ok(outbound)
    }

    fn build_movement(
        &self,
        ctx: &RequestContext,
        request: &CreateMovementRequest,
        reason: String,
        linked_movement_id: Option<Uuid>,
    ) -> StockMovement {
        StockMovement {
            id: Uuid::new_v4(),
            organization_id: ctx.organization_id,
            warehouse_id: request.warehouse_id,
            sku: request.sku.clone(),
            quantity: request.quantity,
            movement_type: request.movement_type,
            direction: request.movement_type.direction(),
            status: MovementStatus::Pending,
            reference_type: request.reference_type.clone(),
            reference_id: request.reference_id.clone(),
            reason,
            cancellation_reason: None,
            linked_movement_id,
            created_by: ctx.user_id,
            created_at: Utc::now(),
            executed_at: None,
            executed_by: None,
        }
    }

    /// Execute a pending movement: mutate stock and complete the movement in
    /// one transaction, then audit and emit `movement.completed`.
    #[instrument(skip(self, ctx), fields(org = %ctx.organization_id, movement_id = %movement_id))]
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        movement_id: Uuid,
    ) -> Result<(StockMovement, InventoryItem)> {
        if self.policy.approval_required {
            return Err(Error::InvalidState(
                "movement execution requires approval".to_string(),
            ));
        }

        let (movement, item) = match self
            .store
            .execute_movement(ctx.organization_id, movement_id, ctx.user_id)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                // State and lookup refusals leave the movement PENDING;
                // anything else is a failed execution
                if !matches!(err, Error::InvalidState(_) | Error::NotFound(_)) {
                    self.store
                        .mark_movement_failed(ctx.organization_id, movement_id)
                        .await
                        .ok();
                }
                return Err(err);
            }
        };

        let signed = match movement.direction {
            MovementDirection::Inbound => movement.quantity,
            MovementDirection::Outbound => -movement.quantity,
        };
        let mut entry = AuditLogger::entry(
            ctx,
            movement.warehouse_id,
            &movement.sku,
            AuditAction::from(movement.movement_type),
            "MOVEMENT",
        );
        entry.previous_quantity = Some(item.quantity - signed);
        entry.new_quantity = Some(item.quantity);
        entry.metadata = serde_json::json!({ "movement_id": movement.id });
        self.audit.record(entry).await;

        let event = DomainEvent::builder(
            names::MOVEMENT_COMPLETED,
            movement.id,
            "Movement",
            ctx.organization_id,
        )
        .user_id(ctx.user_id)
        .data(serde_json::json!({
            "movement_id": movement.id,
            "warehouse_id": movement.warehouse_id,
            "sku": movement.sku,
            "quantity": movement.quantity,
            "direction": movement.direction,
        }))?
        .build();
        self.publisher.publish(&event).await?;

        Ok((movement, item))
    }

    /// PENDING -> CANCELLED with a non-empty reason.
    pub async fn cancel(
        &self,
        ctx: &RequestContext,
        movement_id: Uuid,
        reason: &str,
    ) -> Result<StockMovement> {
        let reason = sanitize_reason(reason);
        if reason.is_empty() {
            return Err(Error::validation("reason", "must not be empty"));
        }
        self.store
            .cancel_movement(ctx.organization_id, movement_id, &reason)
            .await
    }

    pub async fn get(&self, ctx: &RequestContext, movement_id: Uuid) -> Result<StockMovement> {
        self.store
            .get_movement(ctx.organization_id, movement_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("movement {movement_id}")))
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: &MovementFilter,
        page: &PageRequest,
    ) -> Result<(PageResponse<StockMovement>, MovementStats)> {
        let (movements, total) = self
            .store
            .list_movements(ctx.organization_id, filter, page)
            .await?;
        let stats = self.store.movement_stats(ctx.organization_id, filter).await?;
        Ok((PageResponse::new(movements, total, page), stats))
    }

    async fn require_warehouse(&self, ctx: &RequestContext, warehouse_id: Uuid) -> Result<()> {
        self.store
            .get_warehouse(ctx.organization_id, warehouse_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("warehouse {warehouse_id}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_scripts_and_tags() {
        assert_eq!(
            sanitize_reason("restock <script>alert('x')</script>after audit"),
            "restock after audit"
        );
        assert_eq!(sanitize_reason("<b>damaged</b> in transit"), "damaged in transit");
        assert_eq!(sanitize_reason("<script>only</script>"), "");
        assert_eq!(sanitize_reason("  plain reason  "), "plain reason");
    }
}
