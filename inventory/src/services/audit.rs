// ============================================================================
// MERIDIAN COMMERCE - INVENTORY AUDIT LOGGER
// ============================================================================
// Module: inventory/src/services/audit.rs
// Description: Best-effort append-only audit trail for stock mutations
// ============================================================================

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use meridian_shared::types::PageRequest;
use meridian_shared::{RequestContext, Result};

use crate::models::{AuditAction, AuditFilter, AuditStats, InventoryAuditLog};
use crate::store::InventoryStore;

/// Writes audit entries without ever failing the caller: the primary write
/// has already committed by the time an entry lands, so a failed append is
/// logged and dropped.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn InventoryStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    pub fn entry(
        ctx: &RequestContext,
        warehouse_id: Uuid,
        sku: &str,
        action: AuditAction,
        reason_code: &str,
    ) -> InventoryAuditLog {
        InventoryAuditLog {
            id: Uuid::new_v4(),
            organization_id: ctx.organization_id,
            warehouse_id,
            user_id: ctx.user_id,
            sku: sku.to_string(),
            action,
            previous_quantity: None,
            new_quantity: None,
            variance: None,
            variance_percent: None,
            reason_code: reason_code.to_string(),
            notes: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Best-effort append.
    pub async fn record(&self, entry: InventoryAuditLog) {
        if let Err(e) = self.store.append_audit(&entry).await {
            warn!(
                organization_id = %entry.organization_id,
                sku = %entry.sku,
                action = %entry.action,
                error = %e,
                "audit log write failed; continuing"
            );
        }
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: &AuditFilter,
        page: &PageRequest,
    ) -> Result<(Vec<InventoryAuditLog>, i64)> {
        self.store.list_audit(ctx.organization_id, filter, page).await
    }

    pub async fn stats(&self, ctx: &RequestContext, filter: &AuditFilter) -> Result<AuditStats> {
        self.store.audit_stats(ctx.organization_id, filter).await
    }
}
