// ============================================================================
// MERIDIAN COMMERCE - IN-MEMORY INVENTORY STORE
// ============================================================================
// Module: inventory/src/store/memory.rs
// Description: Mutex-guarded store implementation backing hermetic tests
// ============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use meridian_shared::types::PageRequest;
use meridian_shared::{Error, Result};

use super::{InventoryStore, TransferExecution};
use crate::models::{
    AuditFilter, AuditStats, CycleCountSession, InventoryAuditLog, InventoryItem, MovementFilter,
    MovementStats, MovementStatus, NotificationConfig, Reservation, StockMovement, StockWrite,
    TransferRequest, TransferStatus, TransferType, Warehouse,
};

#[derive(Default)]
struct State {
    warehouses: HashMap<Uuid, Warehouse>,
    items: HashMap<(Uuid, String), InventoryItem>,
    reservations: HashMap<Uuid, Reservation>,
    movements: HashMap<Uuid, StockMovement>,
    transfers: HashMap<Uuid, TransferRequest>,
    sessions: HashMap<Uuid, CycleCountSession>,
    audit: Vec<InventoryAuditLog>,
    notification_configs: HashMap<Uuid, NotificationConfig>,
}

/// In-process store with the same transition semantics as the Postgres
/// implementation. The single mutex stands in for row-level locking: every
/// compound operation is serialized, so the §5 transactional units hold.
#[derive(Default)]
pub struct MemoryInventoryStore {
    state: Mutex<State>,
    fail_audit_writes: AtomicBool,
    fail_executions: AtomicBool,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make audit appends fail, for best-effort semantics tests.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    /// Make compound executions fail mid-transaction, for FAILED-marking tests.
    pub fn fail_executions(&self, fail: bool) {
        self.fail_executions.store(fail, Ordering::SeqCst);
    }

    pub fn seed_warehouse(&self, warehouse: Warehouse) {
        let mut state = self.state.lock().expect("store poisoned");
        state.warehouses.insert(warehouse.id, warehouse);
    }

    pub fn seed_item(&self, item: InventoryItem) {
        let mut state = self.state.lock().expect("store poisoned");
        state
            .items
            .insert((item.warehouse_id, item.sku.clone()), item);
    }

    pub fn seed_reservation(&self, reservation: Reservation) {
        let mut state = self.state.lock().expect("store poisoned");
        state.reservations.insert(reservation.id, reservation);
    }

    pub fn set_notification_config(&self, config: NotificationConfig) {
        let mut state = self.state.lock().expect("store poisoned");
        state
            .notification_configs
            .insert(config.organization_id, config);
    }

    pub fn audit_entries(&self) -> Vec<InventoryAuditLog> {
        self.state.lock().expect("store poisoned").audit.clone()
    }

    fn storage_failure() -> Error {
        Error::Database(sqlx::Error::PoolClosed)
    }
}

fn matches_movement(movement: &StockMovement, org: Uuid, filter: &MovementFilter) -> bool {
    movement.organization_id == org
        && filter
            .movement_type
            .map_or(true, |t| movement.movement_type == t)
        && filter.status.map_or(true, |s| movement.status == s)
        && filter
            .warehouse_id
            .map_or(true, |w| movement.warehouse_id == w)
        && filter.sku.as_ref().map_or(true, |s| &movement.sku == s)
        && filter.start_date.map_or(true, |d| movement.created_at >= d)
        && filter.end_date.map_or(true, |d| movement.created_at <= d)
}

fn matches_audit(entry: &InventoryAuditLog, org: Uuid, filter: &AuditFilter) -> bool {
    entry.organization_id == org
        && filter
            .warehouse_id
            .map_or(true, |w| entry.warehouse_id == w)
        && filter.sku.as_ref().map_or(true, |s| &entry.sku == s)
        && filter.action.map_or(true, |a| entry.action == a)
        && filter.start_date.map_or(true, |d| entry.created_at >= d)
        && filter.end_date.map_or(true, |d| entry.created_at <= d)
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn get_warehouse(&self, org: Uuid, warehouse_id: Uuid) -> Result<Option<Warehouse>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state
            .warehouses
            .get(&warehouse_id)
            .filter(|w| w.organization_id == org)
            .cloned())
    }

    async fn get_item(
        &self,
        org: Uuid,
        warehouse_id: Uuid,
        sku: &str,
    ) -> Result<Option<InventoryItem>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state
            .items
            .get(&(warehouse_id, sku.to_string()))
            .filter(|i| i.organization_id == org)
            .cloned())
    }

    async fn list_items(&self, org: Uuid, warehouse_id: Uuid) -> Result<Vec<InventoryItem>> {
        let state = self.state.lock().expect("store poisoned");
        let mut items: Vec<InventoryItem> = state
            .items
            .values()
            .filter(|i| i.organization_id == org && i.warehouse_id == warehouse_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(items)
    }

    async fn set_items_locked(
        &self,
        org: Uuid,
        warehouse_id: Uuid,
        skus: &[String],
        locked: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        for sku in skus {
            if let Some(item) = state.items.get_mut(&(warehouse_id, sku.clone())) {
                if item.organization_id == org {
                    item.is_locked = locked;
                    item.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    async fn insert_movement(&self, movement: &StockMovement) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        state.movements.insert(movement.id, movement.clone());
        Ok(())
    }

    async fn insert_movement_pair(
        &self,
        outbound: &StockMovement,
        inbound: &StockMovement,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        state.movements.insert(outbound.id, outbound.clone());
        state.movements.insert(inbound.id, inbound.clone());
        Ok(())
    }

    async fn get_movement(&self, org: Uuid, movement_id: Uuid) -> Result<Option<StockMovement>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state
            .movements
            .get(&movement_id)
            .filter(|m| m.organization_id == org)
            .cloned())
    }

    async fn list_movements(
        &self,
        org: Uuid,
        filter: &MovementFilter,
        page: &PageRequest,
    ) -> Result<(Vec<StockMovement>, i64)> {
        let state = self.state.lock().expect("store poisoned");
        let mut matching: Vec<StockMovement> = state
            .movements
            .values()
            .filter(|m| matches_movement(m, org, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page_data = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((page_data, total))
    }

    async fn movement_stats(&self, org: Uuid, filter: &MovementFilter) -> Result<MovementStats> {
        let state = self.state.lock().expect("store poisoned");
        let mut stats = MovementStats::default();
        for movement in state
            .movements
            .values()
            .filter(|m| matches_movement(m, org, filter))
        {
            stats.total_count += 1;
            match movement.status {
                MovementStatus::Pending => stats.pending_count += 1,
                MovementStatus::Completed => {
                    stats.completed_count += 1;
                    match movement.direction {
                        crate::models::MovementDirection::Inbound => {
                            stats.inbound_quantity += movement.quantity
                        }
                        crate::models::MovementDirection::Outbound => {
                            stats.outbound_quantity += movement.quantity
                        }
                    }
                }
                MovementStatus::Cancelled => stats.cancelled_count += 1,
                MovementStatus::Failed => stats.failed_count += 1,
            }
        }
        Ok(stats)
    }

    async fn execute_movement(
        &self,
        org: Uuid,
        movement_id: Uuid,
        executed_by: Uuid,
    ) -> Result<(StockMovement, InventoryItem)> {
        let mut state = self.state.lock().expect("store poisoned");

        let mut movement = state
            .movements
            .get(&movement_id)
            .filter(|m| m.organization_id == org)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("movement {movement_id}")))?;

        if movement.status != MovementStatus::Pending {
            return Err(Error::InvalidState(format!(
                "movement {} is {}, only PENDING movements can be executed",
                movement.id, movement.status
            )));
        }

        if self.fail_executions.load(Ordering::SeqCst) {
            return Err(Self::storage_failure());
        }

        let key = (movement.warehouse_id, movement.sku.clone());
        let mut item = match state.items.get(&key) {
            Some(item) if item.organization_id == org => item.clone(),
            Some(_) => return Err(Error::NotFound(format!("inventory row for {}", movement.sku))),
            None => match movement.direction {
                crate::models::MovementDirection::Inbound => {
                    InventoryItem::new(org, movement.warehouse_id, &movement.sku)
                }
                crate::models::MovementDirection::Outbound => {
                    return Err(Error::NotFound(format!(
                        "inventory row for {}",
                        movement.sku
                    )))
                }
            },
        };

        if item.is_locked {
            return Err(Error::InvalidState(format!(
                "inventory row {} is locked for cycle counting",
                item.sku
            )));
        }

        item.apply_movement(movement.direction, movement.quantity)?;
        movement.mark_completed(executed_by)?;

        state.items.insert(key, item.clone());
        state.movements.insert(movement.id, movement.clone());
        Ok((movement, item))
    }

    async fn cancel_movement(
        &self,
        org: Uuid,
        movement_id: Uuid,
        reason: &str,
    ) -> Result<StockMovement> {
        let mut state = self.state.lock().expect("store poisoned");
        let movement = state
            .movements
            .get_mut(&movement_id)
            .filter(|m| m.organization_id == org)
            .ok_or_else(|| Error::NotFound(format!("movement {movement_id}")))?;

        movement.mark_cancelled(reason)?;
        Ok(movement.clone())
    }

    async fn mark_movement_failed(&self, org: Uuid, movement_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        if let Some(movement) = state
            .movements
            .get_mut(&movement_id)
            .filter(|m| m.organization_id == org)
        {
            if movement.status == MovementStatus::Pending {
                movement.status = MovementStatus::Failed;
            }
        }
        Ok(())
    }

    async fn apply_stock_write(
        &self,
        org: Uuid,
        warehouse_id: Uuid,
        sku: &str,
        write: StockWrite,
    ) -> Result<(i64, i64)> {
        let mut state = self.state.lock().expect("store poisoned");
        apply_write_locked(&mut state, org, warehouse_id, sku, write)
    }

    async fn apply_bulk_atomic(
        &self,
        org: Uuid,
        writes: &[(Uuid, String, StockWrite)],
    ) -> Result<Vec<(i64, i64)>> {
        let mut state = self.state.lock().expect("store poisoned");

        // Stage against a copy so the first failure leaves nothing applied
        let mut staged = state.items.clone();
        let mut results = Vec::with_capacity(writes.len());
        for (warehouse_id, sku, write) in writes {
            let result = apply_write_to_items(&mut staged, org, *warehouse_id, sku, *write)?;
            results.push(result);
        }

        state.items = staged;
        Ok(results)
    }

    async fn get_reservation(
        &self,
        org: Uuid,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state
            .reservations
            .get(&reservation_id)
            .filter(|r| r.organization_id == org)
            .cloned())
    }

    async fn insert_transfer(&self, transfer: &TransferRequest) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        state.transfers.insert(transfer.id, transfer.clone());
        Ok(())
    }

    async fn get_transfer(&self, org: Uuid, transfer_id: Uuid) -> Result<Option<TransferRequest>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state
            .transfers
            .get(&transfer_id)
            .filter(|t| t.organization_id == org)
            .cloned())
    }

    async fn update_transfer(&self, transfer: &TransferRequest) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        state.transfers.insert(transfer.id, transfer.clone());
        Ok(())
    }

    async fn has_active_transfer_for_reservation(
        &self,
        org: Uuid,
        reservation_id: Uuid,
    ) -> Result<bool> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state.transfers.values().any(|t| {
            t.organization_id == org && t.reservation_id == reservation_id && t.status.is_active()
        }))
    }

    async fn due_scheduled_transfers(&self, now: DateTime<Utc>) -> Result<Vec<TransferRequest>> {
        let state = self.state.lock().expect("store poisoned");
        let mut due: Vec<TransferRequest> = state
            .transfers
            .values()
            .filter(|t| {
                t.transfer_type == TransferType::Scheduled
                    && matches!(t.status, TransferStatus::Pending | TransferStatus::Approved)
                    && t.scheduled_at.map_or(false, |at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.scheduled_at.cmp(&b.scheduled_at))
        });
        Ok(due)
    }

    async fn execute_transfer(
        &self,
        org: Uuid,
        transfer_id: Uuid,
        _executed_by: Uuid,
    ) -> Result<TransferExecution> {
        let mut state = self.state.lock().expect("store poisoned");

        let mut transfer = state
            .transfers
            .get(&transfer_id)
            .filter(|t| t.organization_id == org)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("transfer {transfer_id}")))?;

        // Status gate before the failure injection so state errors are not
        // misreported as storage failures
        if transfer.status != TransferStatus::Approved
            && transfer.status != TransferStatus::InTransit
        {
            return Err(Error::InvalidState(format!(
                "transfer {} is {}, only APPROVED transfers can be executed",
                transfer.id, transfer.status
            )));
        }

        if self.fail_executions.load(Ordering::SeqCst) {
            return Err(Self::storage_failure());
        }

        let mut reservation = state
            .reservations
            .get(&transfer.reservation_id)
            .filter(|r| r.organization_id == org)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("reservation {}", transfer.reservation_id)))?;

        let source_key = (transfer.source_warehouse_id, transfer.sku.clone());
        let mut source_item = state
            .items
            .get(&source_key)
            .filter(|i| i.organization_id == org)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("inventory row for {}", transfer.sku)))?;

        let target_key = (transfer.target_warehouse_id, transfer.sku.clone());
        let mut target_item = state
            .items
            .get(&target_key)
            .filter(|i| i.organization_id == org)
            .cloned()
            .unwrap_or_else(|| InventoryItem::new(org, transfer.target_warehouse_id, &transfer.sku));

        source_item.release_reserved(transfer.quantity);
        target_item.take_reserved(transfer.quantity);
        reservation.warehouse_id = transfer.target_warehouse_id;
        transfer.mark_completed()?;

        state.items.insert(source_key, source_item.clone());
        state.items.insert(target_key, target_item.clone());
        state.reservations.insert(reservation.id, reservation.clone());
        state.transfers.insert(transfer.id, transfer.clone());

        Ok(TransferExecution {
            transfer,
            source_item,
            target_item,
            reservation,
        })
    }

    async fn mark_transfer_failed(&self, org: Uuid, transfer_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        if let Some(transfer) = state
            .transfers
            .get_mut(&transfer_id)
            .filter(|t| t.organization_id == org)
        {
            if transfer.status.is_active() {
                transfer.status = TransferStatus::Failed;
                transfer.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn insert_cycle_session(&self, session: &CycleCountSession) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        state.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_cycle_session(
        &self,
        org: Uuid,
        session_id: Uuid,
    ) -> Result<Option<CycleCountSession>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state
            .sessions
            .get(&session_id)
            .filter(|s| s.organization_id == org)
            .cloned())
    }

    async fn update_cycle_session(&self, session: &CycleCountSession) -> Result<()> {
        let mut state = self.state.lock().expect("store poisoned");
        state.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn append_audit(&self, entry: &InventoryAuditLog) -> Result<()> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(Self::storage_failure());
        }
        let mut state = self.state.lock().expect("store poisoned");
        state.audit.push(entry.clone());
        Ok(())
    }

    async fn list_audit(
        &self,
        org: Uuid,
        filter: &AuditFilter,
        page: &PageRequest,
    ) -> Result<(Vec<InventoryAuditLog>, i64)> {
        let state = self.state.lock().expect("store poisoned");
        let mut matching: Vec<InventoryAuditLog> = state
            .audit
            .iter()
            .filter(|e| matches_audit(e, org, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page_data = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((page_data, total))
    }

    async fn audit_stats(&self, org: Uuid, filter: &AuditFilter) -> Result<AuditStats> {
        let state = self.state.lock().expect("store poisoned");
        let mut stats = AuditStats::default();
        for entry in state.audit.iter().filter(|e| matches_audit(e, org, filter)) {
            stats.total_entries += 1;
            if let (Some(prev), Some(new)) = (entry.previous_quantity, entry.new_quantity) {
                stats.net_quantity_change += new - prev;
            }
            *stats
                .entries_by_action
                .entry(entry.action.to_string())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn notification_config(&self, org: Uuid) -> Result<NotificationConfig> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state
            .notification_configs
            .get(&org)
            .cloned()
            .unwrap_or_else(|| NotificationConfig::default_for(org)))
    }
}

fn apply_write_locked(
    state: &mut State,
    org: Uuid,
    warehouse_id: Uuid,
    sku: &str,
    write: StockWrite,
) -> Result<(i64, i64)> {
    apply_write_to_items(&mut state.items, org, warehouse_id, sku, write)
}

fn apply_write_to_items(
    items: &mut HashMap<(Uuid, String), InventoryItem>,
    org: Uuid,
    warehouse_id: Uuid,
    sku: &str,
    write: StockWrite,
) -> Result<(i64, i64)> {
    let key = (warehouse_id, sku.to_string());
    let mut item = match items.get(&key) {
        Some(item) if item.organization_id == org => item.clone(),
        Some(_) => return Err(Error::NotFound(format!("inventory row for {sku}"))),
        None => match write {
            StockWrite::Absolute { .. } => InventoryItem::new(org, warehouse_id, sku),
            StockWrite::Delta { change } if change > 0 => {
                InventoryItem::new(org, warehouse_id, sku)
            }
            StockWrite::Delta { .. } => {
                return Err(Error::NotFound(format!("inventory row for {sku}")))
            }
        },
    };

    let previous = match write {
        StockWrite::Absolute { new_quantity } => item.set_quantity(new_quantity)?,
        StockWrite::Delta { change } => item.set_quantity(item.quantity + change)?,
    };
    let new = item.quantity;
    items.insert(key, item);
    Ok((previous, new))
}
