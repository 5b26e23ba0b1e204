// ============================================================================
// MERIDIAN COMMERCE - TRANSFER WORKFLOW ENGINE
// ============================================================================
// Module: inventory/src/services/transfers.rs
// Description: Transfer request lifecycle: create, approve/reject, execute,
//              reschedule, cancel, due-scheduled listing
// ============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use meridian_shared::events::{names, DomainEvent, EventPublisher};
use meridian_shared::{Error, RequestContext, Result};

use super::audit::AuditLogger;
use super::movements::sanitize_reason;
use crate::models::{
    AuditAction, CreateTransferRequest, TransferPriority, TransferRequest, TransferStatus,
    TransferType,
};
use crate::store::{InventoryStore, TransferExecution};

#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn InventoryStore>,
    publisher: Arc<dyn EventPublisher>,
    audit: AuditLogger,
}

impl TransferService {
    pub fn new(store: Arc<dyn InventoryStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self {
            store,
            publisher,
            audit,
        }
    }

    /// Validate and persist a transfer request. IMMEDIATE transfers skip the
    /// pending step and start APPROVED with the requester as approver.
    #[instrument(skip(self, ctx, request), fields(org = %ctx.organization_id))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        request: CreateTransferRequest,
    ) -> Result<TransferRequest> {
        let reason = sanitize_reason(&request.reason);
        if reason.is_empty() {
            return Err(Error::validation("reason", "must not be empty"));
        }
        if request.quantity < 1 {
            return Err(Error::validation("quantity", "must be positive"));
        }
        if request.source_warehouse_id == request.target_warehouse_id {
            return Err(Error::validation(
                "target_warehouse_id",
                "source and target warehouses must differ",
            ));
        }

        let reservation = self
            .store
            .get_reservation(ctx.organization_id, request.reservation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("reservation {}", request.reservation_id)))?;

        if !reservation.is_active() {
            return Err(Error::InvalidState(format!(
                "reservation {} has been released",
                reservation.id
            )));
        }
        if reservation.warehouse_id != request.source_warehouse_id {
            return Err(Error::validation(
                "source_warehouse_id",
                "must match the reservation's warehouse",
            ));
        }
        if request.quantity > reservation.quantity_reserved {
            return Err(Error::validation(
                "quantity",
                format!(
                    "exceeds reserved quantity {}",
                    reservation.quantity_reserved
                ),
            ));
        }

        self.store
            .get_warehouse(ctx.organization_id, request.target_warehouse_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("warehouse {}", request.target_warehouse_id))
            })?;

        if self
            .store
            .has_active_transfer_for_reservation(ctx.organization_id, request.reservation_id)
            .await?
        {
            return Err(Error::AlreadyExists(format!(
                "active transfer for reservation {}",
                request.reservation_id
            )));
        }

        let scheduled_at = match request.transfer_type {
            TransferType::Scheduled => {
                let at = request.scheduled_at.ok_or_else(|| {
                    Error::validation("scheduled_at", "required for SCHEDULED transfers")
                })?;
                if at <= Utc::now() {
                    return Err(Error::validation("scheduled_at", "must be in the future"));
                }
                Some(at)
            }
            _ => None,
        };

        let (status, approved_by) = match request.transfer_type {
            TransferType::Immediate => (TransferStatus::Approved, Some(ctx.user_id)),
            _ => (TransferStatus::Pending, None),
        };

        let now = Utc::now();
        let transfer = TransferRequest {
            id: Uuid::new_v4(),
            organization_id: ctx.organization_id,
            reservation_id: reservation.id,
            source_warehouse_id: request.source_warehouse_id,
            target_warehouse_id: request.target_warehouse_id,
            sku: reservation.sku.clone(),
            quantity: request.quantity,
            transfer_type: request.transfer_type,
            status,
            priority: request.priority.unwrap_or(TransferPriority::Normal),
            scheduled_at,
            reason,
            requested_by: ctx.user_id,
            approved_by,
            rejected_by: None,
            rejection_reason: None,
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        self.store.insert_transfer(&transfer).await?;
        info!(transfer_id = %transfer.id, status = %transfer.status, "transfer requested");

        self.emit(ctx, &transfer, names::TRANSFER_REQUESTED).await?;
        let config = self.store.notification_config(ctx.organization_id).await?;
        if config.notify_on_transfer_request {
            self.emit_notification(
                ctx,
                &transfer,
                names::NOTIFICATION_BATCH,
                serde_json::json!({
                    "audience": "WAREHOUSE_MANAGERS",
                    "transfer_id": transfer.id,
                    "source_warehouse_id": transfer.source_warehouse_id,
                    "target_warehouse_id": transfer.target_warehouse_id,
                }),
            )
            .await?;
        }

        Ok(transfer)
    }

    /// PENDING -> APPROVED. Caller must be an admin or warehouse manager.
    pub async fn approve(&self, ctx: &RequestContext, transfer_id: Uuid) -> Result<TransferRequest> {
        self.require_reviewer(ctx)?;
        let mut transfer = self.get(ctx, transfer_id).await?;
        transfer.approve(ctx.user_id)?;
        self.store.update_transfer(&transfer).await?;

        self.emit(ctx, &transfer, names::TRANSFER_APPROVED).await?;
        Ok(transfer)
    }

    /// PENDING -> REJECTED with a recorded reason.
    pub async fn reject(
        &self,
        ctx: &RequestContext,
        transfer_id: Uuid,
        reason: &str,
    ) -> Result<TransferRequest> {
        self.require_reviewer(ctx)?;
        let reason = sanitize_reason(reason);
        if reason.is_empty() {
            return Err(Error::validation("reason", "must not be empty"));
        }

        let mut transfer = self.get(ctx, transfer_id).await?;
        transfer.reject(ctx.user_id, &reason)?;
        self.store.update_transfer(&transfer).await?;

        self.emit(ctx, &transfer, names::TRANSFER_REJECTED).await?;
        Ok(transfer)
    }

    pub async fn cancel(&self, ctx: &RequestContext, transfer_id: Uuid) -> Result<TransferRequest> {
        let mut transfer = self.get(ctx, transfer_id).await?;
        transfer.cancel()?;
        self.store.update_transfer(&transfer).await?;
        Ok(transfer)
    }

    /// PENDING stays PENDING with a new future `scheduled_at`.
    pub async fn reschedule(
        &self,
        ctx: &RequestContext,
        transfer_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<TransferRequest> {
        let mut transfer = self.get(ctx, transfer_id).await?;
        transfer.reschedule(scheduled_at)?;
        self.store.update_transfer(&transfer).await?;
        Ok(transfer)
    }

    /// Execute an approved transfer: one transaction moves reserved stock,
    /// repoints the reservation and completes the transfer; audit and events
    /// follow the commit.
    #[instrument(skip(self, ctx), fields(org = %ctx.organization_id, transfer_id = %transfer_id))]
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        transfer_id: Uuid,
    ) -> Result<TransferExecution> {
        let execution = match self
            .store
            .execute_transfer(ctx.organization_id, transfer_id, ctx.user_id)
            .await
        {
            Ok(execution) => execution,
            Err(err) => {
                if !matches!(err, Error::InvalidState(_) | Error::NotFound(_)) {
                    self.store
                        .mark_transfer_failed(ctx.organization_id, transfer_id)
                        .await
                        .ok();
                }
                return Err(err);
            }
        };

        let transfer = &execution.transfer;
        let mut entry = AuditLogger::entry(
            ctx,
            transfer.source_warehouse_id,
            &transfer.sku,
            AuditAction::Transfer,
            "TRANSFER",
        );
        entry.metadata = serde_json::json!({
            "source": transfer.source_warehouse_id,
            "target": transfer.target_warehouse_id,
            "quantity": transfer.quantity,
            "reservation_id": transfer.reservation_id,
        });
        self.audit.record(entry).await;

        self.emit(ctx, transfer, names::TRANSFER_COMPLETED).await?;
        let config = self.store.notification_config(ctx.organization_id).await?;
        if config.notify_on_transfer_completion {
            self.emit_notification(
                ctx,
                transfer,
                names::NOTIFICATION_SEND,
                serde_json::json!({
                    "recipient_order_id": execution.reservation.order_id,
                    "transfer_id": transfer.id,
                    "target_warehouse_id": transfer.target_warehouse_id,
                }),
            )
            .await?;
        }

        info!(transfer_id = %transfer.id, "transfer completed");
        Ok(execution)
    }

    pub async fn get(&self, ctx: &RequestContext, transfer_id: Uuid) -> Result<TransferRequest> {
        self.store
            .get_transfer(ctx.organization_id, transfer_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("transfer {transfer_id}")))
    }

    /// Due scheduled transfers for the background worker, sorted by
    /// (priority DESC, scheduled_at ASC).
    pub async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<TransferRequest>> {
        self.store.due_scheduled_transfers(now).await
    }

    fn require_reviewer(&self, ctx: &RequestContext) -> Result<()> {
        if !ctx.role.can_review_transfers() {
            return Err(Error::Forbidden(
                "transfer review requires ADMIN or WAREHOUSE_MANAGER".to_string(),
            ));
        }
        Ok(())
    }

    async fn emit(
        &self,
        ctx: &RequestContext,
        transfer: &TransferRequest,
        event_type: &str,
    ) -> Result<()> {
        let event = DomainEvent::builder(event_type, transfer.id, "Transfer", ctx.organization_id)
            .user_id(ctx.user_id)
            .data(serde_json::json!({
                "transfer_id": transfer.id,
                "reservation_id": transfer.reservation_id,
                "sku": transfer.sku,
                "quantity": transfer.quantity,
                "status": transfer.status,
                "source_warehouse_id": transfer.source_warehouse_id,
                "target_warehouse_id": transfer.target_warehouse_id,
            }))?
            .build();
        self.publisher.publish(&event).await
    }

    async fn emit_notification(
        &self,
        ctx: &RequestContext,
        transfer: &TransferRequest,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let event =
            DomainEvent::builder(event_type, transfer.id, "Notification", ctx.organization_id)
                .user_id(ctx.user_id)
                .data(data)?
                .build();
        self.publisher.publish(&event).await
    }
}
