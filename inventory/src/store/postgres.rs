// ============================================================================
// MERIDIAN COMMERCE - POSTGRES INVENTORY STORE
// ============================================================================
// Module: inventory/src/store/postgres.rs
// Description: Relational store implementation. Compound operations run in a
//              single transaction with row-level locks.
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use uuid::Uuid;

use meridian_shared::types::PageRequest;
use meridian_shared::{Error, Result};

use super::{InventoryStore, TransferExecution};
use crate::models::{
    AuditFilter, AuditStats, CycleCount, CycleCountSession, InventoryAuditLog, InventoryItem,
    MovementDirection, MovementFilter, MovementStats, MovementStatus, NotificationConfig,
    Reservation, StockMovement, StockWrite, TransferRequest, TransferStatus, Warehouse,
};

#[derive(Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- row mapping -------------------------------------------------------------

fn item_from_row(row: &PgRow) -> Result<InventoryItem> {
    Ok(InventoryItem {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        warehouse_id: row.get("warehouse_id"),
        sku: row.get("sku"),
        quantity: row.get("quantity"),
        reserved_quantity: row.get("reserved_quantity"),
        is_locked: row.get("is_locked"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement> {
    Ok(StockMovement {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        warehouse_id: row.get("warehouse_id"),
        sku: row.get("sku"),
        quantity: row.get("quantity"),
        movement_type: row.get::<String, _>("movement_type").parse()?,
        direction: row.get::<String, _>("direction").parse()?,
        status: row.get::<String, _>("status").parse()?,
        reference_type: row.get("reference_type"),
        reference_id: row.get("reference_id"),
        reason: row.get("reason"),
        cancellation_reason: row.get("cancellation_reason"),
        linked_movement_id: row.get("linked_movement_id"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        executed_at: row.get("executed_at"),
        executed_by: row.get("executed_by"),
    })
}

fn transfer_from_row(row: &PgRow) -> Result<TransferRequest> {
    Ok(TransferRequest {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        reservation_id: row.get("reservation_id"),
        source_warehouse_id: row.get("source_warehouse_id"),
        target_warehouse_id: row.get("target_warehouse_id"),
        sku: row.get("sku"),
        quantity: row.get("quantity"),
        transfer_type: row.get::<String, _>("transfer_type").parse()?,
        status: row.get::<String, _>("status").parse()?,
        priority: row.get::<String, _>("priority").parse()?,
        scheduled_at: row.get("scheduled_at"),
        reason: row.get("reason"),
        requested_by: row.get("requested_by"),
        approved_by: row.get("approved_by"),
        rejected_by: row.get("rejected_by"),
        rejection_reason: row.get("rejection_reason"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        completed_at: row.get("completed_at"),
    })
}

fn reservation_from_row(row: &PgRow) -> Result<Reservation> {
    Ok(Reservation {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        order_id: row.get("order_id"),
        sku: row.get("sku"),
        warehouse_id: row.get("warehouse_id"),
        quantity_reserved: row.get("quantity_reserved"),
        released_at: row.get("released_at"),
    })
}

fn session_from_row(row: &PgRow) -> Result<CycleCountSession> {
    let counts: serde_json::Value = row.get("counts");
    let counts: Vec<CycleCount> = serde_json::from_value(counts)?;
    Ok(CycleCountSession {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        warehouse_id: row.get("warehouse_id"),
        count_type: row.get::<String, _>("count_type").parse()?,
        is_blind: row.get("is_blind"),
        lock_items: row.get("lock_items"),
        status: row.get::<String, _>("status").parse()?,
        item_skus: row.get("item_skus"),
        counts,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    })
}

fn audit_from_row(row: &PgRow) -> Result<InventoryAuditLog> {
    Ok(InventoryAuditLog {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        warehouse_id: row.get("warehouse_id"),
        user_id: row.get("user_id"),
        sku: row.get("sku"),
        action: row.get::<String, _>("action").parse()?,
        previous_quantity: row.get("previous_quantity"),
        new_quantity: row.get("new_quantity"),
        variance: row.get("variance"),
        variance_percent: row.get("variance_percent"),
        reason_code: row.get("reason_code"),
        notes: row.get("notes"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
    })
}

const ITEM_COLUMNS: &str = "id, organization_id, warehouse_id, sku, quantity, reserved_quantity, \
     is_locked, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, organization_id, warehouse_id, sku, quantity, movement_type, \
     direction, status, reference_type, reference_id, reason, cancellation_reason, \
     linked_movement_id, created_by, created_at, executed_at, executed_by";

const TRANSFER_COLUMNS: &str = "id, organization_id, reservation_id, source_warehouse_id, \
     target_warehouse_id, sku, quantity, transfer_type, status, priority, scheduled_at, reason, \
     requested_by, approved_by, rejected_by, rejection_reason, notes, created_at, updated_at, \
     completed_at";

// -- transaction helpers -----------------------------------------------------

async fn lock_item(
    tx: &mut Transaction<'_, Postgres>,
    org: Uuid,
    warehouse_id: Uuid,
    sku: &str,
) -> Result<Option<InventoryItem>> {
    let row = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items \
         WHERE organization_id = $1 AND warehouse_id = $2 AND sku = $3 FOR UPDATE"
    ))
    .bind(org)
    .bind(warehouse_id)
    .bind(sku)
    .fetch_optional(&mut **tx)
    .await?;

    row.as_ref().map(item_from_row).transpose()
}

async fn insert_item(tx: &mut Transaction<'_, Postgres>, item: &InventoryItem) -> Result<()> {
    sqlx::query(
        "INSERT INTO inventory_items \
         (id, organization_id, warehouse_id, sku, quantity, reserved_quantity, is_locked, \
          created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(item.id)
    .bind(item.organization_id)
    .bind(item.warehouse_id)
    .bind(&item.sku)
    .bind(item.quantity)
    .bind(item.reserved_quantity)
    .bind(item.is_locked)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn update_item_quantities(
    tx: &mut Transaction<'_, Postgres>,
    item: &InventoryItem,
) -> Result<()> {
    sqlx::query(
        "UPDATE inventory_items \
         SET quantity = $1, reserved_quantity = $2, updated_at = $3 WHERE id = $4",
    )
    .bind(item.quantity)
    .bind(item.reserved_quantity)
    .bind(item.updated_at)
    .bind(item.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Get-or-create under lock, then apply an absolute or delta write.
async fn apply_write_tx(
    tx: &mut Transaction<'_, Postgres>,
    org: Uuid,
    warehouse_id: Uuid,
    sku: &str,
    write: StockWrite,
) -> Result<(i64, i64)> {
    let existing = lock_item(tx, org, warehouse_id, sku).await?;
    let mut item = match existing {
        Some(item) => item,
        None => {
            let creatable = matches!(write, StockWrite::Absolute { .. })
                || matches!(write, StockWrite::Delta { change } if change > 0);
            if !creatable {
                return Err(Error::NotFound(format!("inventory row for {sku}")));
            }
            let item = InventoryItem::new(org, warehouse_id, sku);
            insert_item(tx, &item).await?;
            item
        }
    };

    let previous = match write {
        StockWrite::Absolute { new_quantity } => item.set_quantity(new_quantity)?,
        StockWrite::Delta { change } => item.set_quantity(item.quantity + change)?,
    };
    update_item_quantities(tx, &item).await?;
    Ok((previous, item.quantity))
}

async fn persist_movement_state(
    tx: &mut Transaction<'_, Postgres>,
    movement: &StockMovement,
) -> Result<()> {
    sqlx::query(
        "UPDATE stock_movements \
         SET status = $1, cancellation_reason = $2, executed_at = $3, executed_by = $4 \
         WHERE id = $5",
    )
    .bind(movement.status.to_string())
    .bind(&movement.cancellation_reason)
    .bind(movement.executed_at)
    .bind(movement.executed_by)
    .bind(movement.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn push_movement_filters(builder: &mut QueryBuilder<Postgres>, org: Uuid, filter: &MovementFilter) {
    builder.push(" WHERE organization_id = ");
    builder.push_bind(org);
    if let Some(movement_type) = filter.movement_type {
        builder.push(" AND movement_type = ");
        builder.push_bind(movement_type.to_string());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.to_string());
    }
    if let Some(warehouse_id) = filter.warehouse_id {
        builder.push(" AND warehouse_id = ");
        builder.push_bind(warehouse_id);
    }
    if let Some(sku) = &filter.sku {
        builder.push(" AND sku = ");
        builder.push_bind(sku.clone());
    }
    if let Some(start) = filter.start_date {
        builder.push(" AND created_at >= ");
        builder.push_bind(start);
    }
    if let Some(end) = filter.end_date {
        builder.push(" AND created_at <= ");
        builder.push_bind(end);
    }
}

fn push_audit_filters(builder: &mut QueryBuilder<Postgres>, org: Uuid, filter: &AuditFilter) {
    builder.push(" WHERE organization_id = ");
    builder.push_bind(org);
    if let Some(warehouse_id) = filter.warehouse_id {
        builder.push(" AND warehouse_id = ");
        builder.push_bind(warehouse_id);
    }
    if let Some(sku) = &filter.sku {
        builder.push(" AND sku = ");
        builder.push_bind(sku.clone());
    }
    if let Some(action) = filter.action {
        builder.push(" AND action = ");
        builder.push_bind(action.to_string());
    }
    if let Some(start) = filter.start_date {
        builder.push(" AND created_at >= ");
        builder.push_bind(start);
    }
    if let Some(end) = filter.end_date {
        builder.push(" AND created_at <= ");
        builder.push_bind(end);
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn get_warehouse(&self, org: Uuid, warehouse_id: Uuid) -> Result<Option<Warehouse>> {
        let row = sqlx::query(
            "SELECT id, organization_id, name FROM warehouses \
             WHERE id = $1 AND organization_id = $2",
        )
        .bind(warehouse_id)
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Warehouse {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            name: row.get("name"),
        }))
    }

    async fn get_item(
        &self,
        org: Uuid,
        warehouse_id: Uuid,
        sku: &str,
    ) -> Result<Option<InventoryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE organization_id = $1 AND warehouse_id = $2 AND sku = $3"
        ))
        .bind(org)
        .bind(warehouse_id)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn list_items(&self, org: Uuid, warehouse_id: Uuid) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE organization_id = $1 AND warehouse_id = $2 ORDER BY sku"
        ))
        .bind(org)
        .bind(warehouse_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    async fn set_items_locked(
        &self,
        org: Uuid,
        warehouse_id: Uuid,
        skus: &[String],
        locked: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE inventory_items SET is_locked = $1, updated_at = NOW() \
             WHERE organization_id = $2 AND warehouse_id = $3 AND sku = ANY($4)",
        )
        .bind(locked)
        .bind(org)
        .bind(warehouse_id)
        .bind(skus)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_movement(&self, movement: &StockMovement) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_movement_tx(&mut tx, movement).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_movement_pair(
        &self,
        outbound: &StockMovement,
        inbound: &StockMovement,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_movement_tx(&mut tx, outbound).await?;
        insert_movement_tx(&mut tx, inbound).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_movement(&self, org: Uuid, movement_id: Uuid) -> Result<Option<StockMovement>> {
        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE id = $1 AND organization_id = $2"
        ))
        .bind(movement_id)
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(movement_from_row).transpose()
    }

    async fn list_movements(
        &self,
        org: Uuid,
        filter: &MovementFilter,
        page: &PageRequest,
    ) -> Result<(Vec<StockMovement>, i64)> {
        let mut count_builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM stock_movements");
        push_movement_filters(&mut count_builder, org, filter);
        let total: i64 = count_builder
            .build()
            .fetch_one(&self.pool)
            .await?
            .get("total");

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements"
        ));
        push_movement_filters(&mut builder, org, filter);
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder.build().fetch_all(&self.pool).await?;
        let movements = rows
            .iter()
            .map(movement_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((movements, total))
    }

    async fn movement_stats(&self, org: Uuid, filter: &MovementFilter) -> Result<MovementStats> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) AS total_count, \
             COUNT(*) FILTER (WHERE status = 'PENDING') AS pending_count, \
             COUNT(*) FILTER (WHERE status = 'COMPLETED') AS completed_count, \
             COUNT(*) FILTER (WHERE status = 'CANCELLED') AS cancelled_count, \
             COUNT(*) FILTER (WHERE status = 'FAILED') AS failed_count, \
             COALESCE(SUM(quantity) FILTER (WHERE status = 'COMPLETED' AND direction = 'inbound'), 0)::BIGINT AS inbound_quantity, \
             COALESCE(SUM(quantity) FILTER (WHERE status = 'COMPLETED' AND direction = 'outbound'), 0)::BIGINT AS outbound_quantity \
             FROM stock_movements",
        );
        push_movement_filters(&mut builder, org, filter);

        let row = builder.build().fetch_one(&self.pool).await?;
        Ok(MovementStats {
            total_count: row.get("total_count"),
            pending_count: row.get("pending_count"),
            completed_count: row.get("completed_count"),
            cancelled_count: row.get("cancelled_count"),
            failed_count: row.get("failed_count"),
            inbound_quantity: row.get("inbound_quantity"),
            outbound_quantity: row.get("outbound_quantity"),
        })
    }

    async fn execute_movement(
        &self,
        org: Uuid,
        movement_id: Uuid,
        executed_by: Uuid,
    ) -> Result<(StockMovement, InventoryItem)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE id = $1 AND organization_id = $2 FOR UPDATE"
        ))
        .bind(movement_id)
        .bind(org)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("movement {movement_id}")))?;
        let mut movement = movement_from_row(&row)?;

        if movement.status != MovementStatus::Pending {
            return Err(Error::InvalidState(format!(
                "movement {} is {}, only PENDING movements can be executed",
                movement.id, movement.status
            )));
        }

        let mut item = match lock_item(&mut tx, org, movement.warehouse_id, &movement.sku).await? {
            Some(item) => item,
            None if movement.direction == MovementDirection::Inbound => {
                let item = InventoryItem::new(org, movement.warehouse_id, &movement.sku);
                insert_item(&mut tx, &item).await?;
                item
            }
            None => {
                return Err(Error::NotFound(format!(
                    "inventory row for {}",
                    movement.sku
                )))
            }
        };

        if item.is_locked {
            return Err(Error::InvalidState(format!(
                "inventory row {} is locked for cycle counting",
                item.sku
            )));
        }

        item.apply_movement(movement.direction, movement.quantity)?;
        movement.mark_completed(executed_by)?;

        update_item_quantities(&mut tx, &item).await?;
        persist_movement_state(&mut tx, &movement).await?;
        tx.commit().await?;

        Ok((movement, item))
    }

    async fn cancel_movement(
        &self,
        org: Uuid,
        movement_id: Uuid,
        reason: &str,
    ) -> Result<StockMovement> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE id = $1 AND organization_id = $2 FOR UPDATE"
        ))
        .bind(movement_id)
        .bind(org)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("movement {movement_id}")))?;
        let mut movement = movement_from_row(&row)?;

        movement.mark_cancelled(reason)?;
        persist_movement_state(&mut tx, &movement).await?;
        tx.commit().await?;
        Ok(movement)
    }

    async fn mark_movement_failed(&self, org: Uuid, movement_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE stock_movements SET status = 'FAILED' \
             WHERE id = $1 AND organization_id = $2 AND status = 'PENDING'",
        )
        .bind(movement_id)
        .bind(org)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_stock_write(
        &self,
        org: Uuid,
        warehouse_id: Uuid,
        sku: &str,
        write: StockWrite,
    ) -> Result<(i64, i64)> {
        let mut tx = self.pool.begin().await?;
        let result = apply_write_tx(&mut tx, org, warehouse_id, sku, write).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn apply_bulk_atomic(
        &self,
        org: Uuid,
        writes: &[(Uuid, String, StockWrite)],
    ) -> Result<Vec<(i64, i64)>> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(writes.len());
        for (warehouse_id, sku, write) in writes {
            // First failure aborts the whole batch via the dropped transaction
            let result = apply_write_tx(&mut tx, org, *warehouse_id, sku, *write).await?;
            results.push(result);
        }
        tx.commit().await?;
        Ok(results)
    }

    async fn get_reservation(
        &self,
        org: Uuid,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>> {
        let row = sqlx::query(
            "SELECT id, organization_id, order_id, sku, warehouse_id, quantity_reserved, \
             released_at FROM reservations WHERE id = $1 AND organization_id = $2",
        )
        .bind(reservation_id)
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn insert_transfer(&self, transfer: &TransferRequest) -> Result<()> {
        sqlx::query(
            "INSERT INTO transfer_requests \
             (id, organization_id, reservation_id, source_warehouse_id, target_warehouse_id, \
              sku, quantity, transfer_type, status, priority, scheduled_at, reason, requested_by, \
              approved_by, rejected_by, rejection_reason, notes, created_at, updated_at, \
              completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                     $18, $19, $20)",
        )
        .bind(transfer.id)
        .bind(transfer.organization_id)
        .bind(transfer.reservation_id)
        .bind(transfer.source_warehouse_id)
        .bind(transfer.target_warehouse_id)
        .bind(&transfer.sku)
        .bind(transfer.quantity)
        .bind(transfer.transfer_type.to_string())
        .bind(transfer.status.to_string())
        .bind(transfer.priority.to_string())
        .bind(transfer.scheduled_at)
        .bind(&transfer.reason)
        .bind(transfer.requested_by)
        .bind(transfer.approved_by)
        .bind(transfer.rejected_by)
        .bind(&transfer.rejection_reason)
        .bind(&transfer.notes)
        .bind(transfer.created_at)
        .bind(transfer.updated_at)
        .bind(transfer.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_transfer(&self, org: Uuid, transfer_id: Uuid) -> Result<Option<TransferRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfer_requests \
             WHERE id = $1 AND organization_id = $2"
        ))
        .bind(transfer_id)
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(transfer_from_row).transpose()
    }

    async fn update_transfer(&self, transfer: &TransferRequest) -> Result<()> {
        sqlx::query(
            "UPDATE transfer_requests \
             SET status = $1, priority = $2, scheduled_at = $3, approved_by = $4, \
                 rejected_by = $5, rejection_reason = $6, notes = $7, updated_at = $8, \
                 completed_at = $9 \
             WHERE id = $10 AND organization_id = $11",
        )
        .bind(transfer.status.to_string())
        .bind(transfer.priority.to_string())
        .bind(transfer.scheduled_at)
        .bind(transfer.approved_by)
        .bind(transfer.rejected_by)
        .bind(&transfer.rejection_reason)
        .bind(&transfer.notes)
        .bind(transfer.updated_at)
        .bind(transfer.completed_at)
        .bind(transfer.id)
        .bind(transfer.organization_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn has_active_transfer_for_reservation(
        &self,
        org: Uuid,
        reservation_id: Uuid,
    ) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS( \
               SELECT 1 FROM transfer_requests \
               WHERE organization_id = $1 AND reservation_id = $2 \
                 AND status IN ('PENDING', 'APPROVED', 'IN_TRANSIT')) AS active",
        )
        .bind(org)
        .bind(reservation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("active"))
    }

    async fn due_scheduled_transfers(&self, now: DateTime<Utc>) -> Result<Vec<TransferRequest>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfer_requests \
             WHERE transfer_type = 'SCHEDULED' AND status IN ('PENDING', 'APPROVED') \
               AND scheduled_at <= $1 \
             ORDER BY CASE priority \
                        WHEN 'URGENT' THEN 0 WHEN 'HIGH' THEN 1 \
                        WHEN 'NORMAL' THEN 2 ELSE 3 END, \
                      scheduled_at ASC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transfer_from_row).collect()
    }

    async fn execute_transfer(
        &self,
        org: Uuid,
        transfer_id: Uuid,
        _executed_by: Uuid,
    ) -> Result<TransferExecution> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfer_requests \
             WHERE id = $1 AND organization_id = $2 FOR UPDATE"
        ))
        .bind(transfer_id)
        .bind(org)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("transfer {transfer_id}")))?;
        let mut transfer = transfer_from_row(&row)?;

        if transfer.status != TransferStatus::Approved
            && transfer.status != TransferStatus::InTransit
        {
            return Err(Error::InvalidState(format!(
                "transfer {} is {}, only APPROVED transfers can be executed",
                transfer.id, transfer.status
            )));
        }

        let row = sqlx::query(
            "SELECT id, organization_id, order_id, sku, warehouse_id, quantity_reserved, \
             released_at FROM reservations WHERE id = $1 AND organization_id = $2 FOR UPDATE",
        )
        .bind(transfer.reservation_id)
        .bind(org)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("reservation {}", transfer.reservation_id)))?;
        let mut reservation = reservation_from_row(&row)?;

        let mut source_item =
            lock_item(&mut tx, org, transfer.source_warehouse_id, &transfer.sku)
                .await?
                .ok_or_else(|| Error::NotFound(format!("inventory row for {}", transfer.sku)))?;

        let mut target_item =
            match lock_item(&mut tx, org, transfer.target_warehouse_id, &transfer.sku).await? {
                Some(item) => item,
                None => {
                    let item =
                        InventoryItem::new(org, transfer.target_warehouse_id, &transfer.sku);
                    insert_item(&mut tx, &item).await?;
                    item
                }
            };

        source_item.release_reserved(transfer.quantity);
        target_item.take_reserved(transfer.quantity);
        reservation.warehouse_id = transfer.target_warehouse_id;
        transfer.mark_completed()?;

        update_item_quantities(&mut tx, &source_item).await?;
        update_item_quantities(&mut tx, &target_item).await?;
        sqlx::query("UPDATE reservations SET warehouse_id = $1 WHERE id = $2")
            .bind(reservation.warehouse_id)
            .bind(reservation.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE transfer_requests SET status = $1, updated_at = $2, completed_at = $3 \
             WHERE id = $4",
        )
        .bind(transfer.status.to_string())
        .bind(transfer.updated_at)
        .bind(transfer.completed_at)
        .bind(transfer.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(TransferExecution {
            transfer,
            source_item,
            target_item,
            reservation,
        })
    }

    async fn mark_transfer_failed(&self, org: Uuid, transfer_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE transfer_requests SET status = 'FAILED', updated_at = NOW() \
             WHERE id = $1 AND organization_id = $2 \
               AND status IN ('PENDING', 'APPROVED', 'IN_TRANSIT')",
        )
        .bind(transfer_id)
        .bind(org)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_cycle_session(&self, session: &CycleCountSession) -> Result<()> {
        sqlx::query(
            "INSERT INTO cycle_count_sessions \
             (id, organization_id, warehouse_id, count_type, is_blind, lock_items, status, \
              item_skus, counts, created_by, created_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(session.id)
        .bind(session.organization_id)
        .bind(session.warehouse_id)
        .bind(session.count_type.to_string())
        .bind(session.is_blind)
        .bind(session.lock_items)
        .bind(session.status.to_string())
        .bind(&session.item_skus)
        .bind(serde_json::to_value(&session.counts)?)
        .bind(session.created_by)
        .bind(session.created_at)
        .bind(session.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_cycle_session(
        &self,
        org: Uuid,
        session_id: Uuid,
    ) -> Result<Option<CycleCountSession>> {
        let row = sqlx::query(
            "SELECT id, organization_id, warehouse_id, count_type, is_blind, lock_items, status, \
             item_skus, counts, created_by, created_at, completed_at \
             FROM cycle_count_sessions WHERE id = $1 AND organization_id = $2",
        )
        .bind(session_id)
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn update_cycle_session(&self, session: &CycleCountSession) -> Result<()> {
        sqlx::query(
            "UPDATE cycle_count_sessions \
             SET status = $1, counts = $2, completed_at = $3 \
             WHERE id = $4 AND organization_id = $5",
        )
        .bind(session.status.to_string())
        .bind(serde_json::to_value(&session.counts)?)
        .bind(session.completed_at)
        .bind(session.id)
        .bind(session.organization_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_audit(&self, entry: &InventoryAuditLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO inventory_audit_log \
             (id, organization_id, warehouse_id, user_id, sku, action, previous_quantity, \
              new_quantity, variance, variance_percent, reason_code, notes, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(entry.id)
        .bind(entry.organization_id)
        .bind(entry.warehouse_id)
        .bind(entry.user_id)
        .bind(&entry.sku)
        .bind(entry.action.to_string())
        .bind(entry.previous_quantity)
        .bind(entry.new_quantity)
        .bind(entry.variance)
        .bind(entry.variance_percent)
        .bind(&entry.reason_code)
        .bind(&entry.notes)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit(
        &self,
        org: Uuid,
        filter: &AuditFilter,
        page: &PageRequest,
    ) -> Result<(Vec<InventoryAuditLog>, i64)> {
        let mut count_builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM inventory_audit_log");
        push_audit_filters(&mut count_builder, org, filter);
        let total: i64 = count_builder
            .build()
            .fetch_one(&self.pool)
            .await?
            .get("total");

        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT id, organization_id, warehouse_id, user_id, sku, action, previous_quantity, \
             new_quantity, variance, variance_percent, reason_code, notes, metadata, created_at \
             FROM inventory_audit_log",
        );
        push_audit_filters(&mut builder, org, filter);
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder.build().fetch_all(&self.pool).await?;
        let entries = rows.iter().map(audit_from_row).collect::<Result<Vec<_>>>()?;
        Ok((entries, total))
    }

    async fn audit_stats(&self, org: Uuid, filter: &AuditFilter) -> Result<AuditStats> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT action, COUNT(*) AS entries, \
             COALESCE(SUM(new_quantity - previous_quantity), 0)::BIGINT AS net_change \
             FROM inventory_audit_log",
        );
        push_audit_filters(&mut builder, org, filter);
        builder.push(" GROUP BY action");

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut stats = AuditStats::default();
        for row in rows {
            let entries: i64 = row.get("entries");
            stats.total_entries += entries;
            stats.net_quantity_change += row.get::<i64, _>("net_change");
            stats
                .entries_by_action
                .insert(row.get::<String, _>("action"), entries);
        }
        Ok(stats)
    }

    async fn notification_config(&self, org: Uuid) -> Result<NotificationConfig> {
        let row = sqlx::query(
            "SELECT organization_id, notify_on_transfer_request, notify_on_transfer_completion \
             FROM notification_configs WHERE organization_id = $1",
        )
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => NotificationConfig {
                organization_id: row.get("organization_id"),
                notify_on_transfer_request: row.get("notify_on_transfer_request"),
                notify_on_transfer_completion: row.get("notify_on_transfer_completion"),
            },
            None => NotificationConfig::default_for(org),
        })
    }
}

async fn insert_movement_tx(
    tx: &mut Transaction<'_, Postgres>,
    movement: &StockMovement,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO stock_movements \
         (id, organization_id, warehouse_id, sku, quantity, movement_type, direction, status, \
          reference_type, reference_id, reason, cancellation_reason, linked_movement_id, \
          created_by, created_at, executed_at, executed_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(movement.id)
    .bind(movement.organization_id)
    .bind(movement.warehouse_id)
    .bind(&movement.sku)
    .bind(movement.quantity)
    .bind(movement.movement_type.to_string())
    .bind(movement.direction.to_string())
    .bind(movement.status.to_string())
    .bind(&movement.reference_type)
    .bind(&movement.reference_id)
    .bind(&movement.reason)
    .bind(&movement.cancellation_reason)
    .bind(movement.linked_movement_id)
    .bind(movement.created_by)
    .bind(movement.created_at)
    .bind(movement.executed_at)
    .bind(movement.executed_by)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
