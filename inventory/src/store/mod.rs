// ============================================================================
// MERIDIAN COMMERCE - INVENTORY STORE
// ============================================================================
// Module: inventory/src/store/mod.rs
// Description: Storage contract for the inventory ledger. Methods marked
//              atomic correspond to single storage transactions.
// ============================================================================

pub mod memory;
pub mod postgres;

pub use memory::MemoryInventoryStore;
pub use postgres::PgInventoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use meridian_shared::types::PageRequest;
use meridian_shared::Result;

use crate::models::{
    AuditFilter, AuditStats, CycleCountSession, InventoryAuditLog, InventoryItem, MovementFilter,
    MovementStats, NotificationConfig, Reservation, StockMovement, StockWrite, TransferRequest,
    Warehouse,
};

/// Result of an executed transfer, for audit and event emission.
#[derive(Debug, Clone)]
pub struct TransferExecution {
    pub transfer: TransferRequest,
    pub source_item: InventoryItem,
    pub target_item: InventoryItem,
    pub reservation: Reservation,
}

/// Storage contract for the inventory ledger.
///
/// Every method is tenant-scoped: callers pass the organization id from the
/// request context and implementations filter all reads and writes by it.
/// Compound methods (`execute_movement`, `execute_transfer`,
/// `apply_bulk_atomic`) are single storage transactions; concurrent outbound
/// mutations against one row serialize on a row lock.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    // -- warehouses --------------------------------------------------------

    async fn get_warehouse(&self, org: Uuid, warehouse_id: Uuid) -> Result<Option<Warehouse>>;

    // -- stock rows --------------------------------------------------------

    async fn get_item(&self, org: Uuid, warehouse_id: Uuid, sku: &str)
        -> Result<Option<InventoryItem>>;

    async fn list_items(&self, org: Uuid, warehouse_id: Uuid) -> Result<Vec<InventoryItem>>;

    /// Set or clear `is_locked` on the referenced rows.
    async fn set_items_locked(
        &self,
        org: Uuid,
        warehouse_id: Uuid,
        skus: &[String],
        locked: bool,
    ) -> Result<()>;

    // -- movements ---------------------------------------------------------

    async fn insert_movement(&self, movement: &StockMovement) -> Result<()>;

    /// Atomic insert of a linked TRANSFER_OUT / TRANSFER_IN pair.
    async fn insert_movement_pair(
        &self,
        outbound: &StockMovement,
        inbound: &StockMovement,
    ) -> Result<()>;

    async fn get_movement(&self, org: Uuid, movement_id: Uuid) -> Result<Option<StockMovement>>;

    async fn list_movements(
        &self,
        org: Uuid,
        filter: &MovementFilter,
        page: &PageRequest,
    ) -> Result<(Vec<StockMovement>, i64)>;

    async fn movement_stats(&self, org: Uuid, filter: &MovementFilter) -> Result<MovementStats>;

    /// Atomic execute: re-reads the movement and its stock row under lock,
    /// re-validates available stock for outbound, mutates the row (creating
    /// it on first inbound receipt), and completes the movement.
    async fn execute_movement(
        &self,
        org: Uuid,
        movement_id: Uuid,
        executed_by: Uuid,
    ) -> Result<(StockMovement, InventoryItem)>;

    async fn cancel_movement(
        &self,
        org: Uuid,
        movement_id: Uuid,
        reason: &str,
    ) -> Result<StockMovement>;

    /// Best-effort secondary write after a failed execution.
    async fn mark_movement_failed(&self, org: Uuid, movement_id: Uuid) -> Result<()>;

    // -- direct stock writes ----------------------------------------------

    /// Atomic absolute or delta write against one row, creating it when an
    /// absolute write targets a missing row. Returns (previous, new).
    async fn apply_stock_write(
        &self,
        org: Uuid,
        warehouse_id: Uuid,
        sku: &str,
        write: StockWrite,
    ) -> Result<(i64, i64)>;

    /// All-or-nothing bulk write: one transaction, first failure rolls back.
    async fn apply_bulk_atomic(
        &self,
        org: Uuid,
        writes: &[(Uuid, String, StockWrite)],
    ) -> Result<Vec<(i64, i64)>>;

    // -- reservations ------------------------------------------------------

    async fn get_reservation(&self, org: Uuid, reservation_id: Uuid)
        -> Result<Option<Reservation>>;

    // -- transfers ---------------------------------------------------------

    async fn insert_transfer(&self, transfer: &TransferRequest) -> Result<()>;

    async fn get_transfer(&self, org: Uuid, transfer_id: Uuid) -> Result<Option<TransferRequest>>;

    async fn update_transfer(&self, transfer: &TransferRequest) -> Result<()>;

    async fn has_active_transfer_for_reservation(
        &self,
        org: Uuid,
        reservation_id: Uuid,
    ) -> Result<bool>;

    /// Due scheduled transfers across tenants for the background worker,
    /// sorted by (priority DESC, scheduled_at ASC).
    async fn due_scheduled_transfers(&self, now: DateTime<Utc>) -> Result<Vec<TransferRequest>>;

    /// Atomic execute per the transfer contract: move reserved stock from
    /// source to target, repoint the reservation's warehouse, complete the
    /// transfer.
    async fn execute_transfer(
        &self,
        org: Uuid,
        transfer_id: Uuid,
        executed_by: Uuid,
    ) -> Result<TransferExecution>;

    /// Best-effort secondary write after a failed execution.
    async fn mark_transfer_failed(&self, org: Uuid, transfer_id: Uuid) -> Result<()>;

    // -- cycle count sessions ---------------------------------------------

    async fn insert_cycle_session(&self, session: &CycleCountSession) -> Result<()>;

    async fn get_cycle_session(
        &self,
        org: Uuid,
        session_id: Uuid,
    ) -> Result<Option<CycleCountSession>>;

    async fn update_cycle_session(&self, session: &CycleCountSession) -> Result<()>;

    // -- audit log ---------------------------------------------------------

    async fn append_audit(&self, entry: &InventoryAuditLog) -> Result<()>;

    async fn list_audit(
        &self,
        org: Uuid,
        filter: &AuditFilter,
        page: &PageRequest,
    ) -> Result<(Vec<InventoryAuditLog>, i64)>;

    async fn audit_stats(&self, org: Uuid, filter: &AuditFilter) -> Result<AuditStats>;

    // -- notification configuration ---------------------------------------

    async fn notification_config(&self, org: Uuid) -> Result<NotificationConfig>;
}
