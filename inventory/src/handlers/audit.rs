// ============================================================================
// MERIDIAN COMMERCE - AUDIT HANDLERS
// ============================================================================
// Module: inventory/src/handlers/audit.rs
// Description: HTTP handler for audit log listing with statistics
// ============================================================================

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use meridian_shared::types::{ApiResponse, PageRequest, PageResponse};
use meridian_shared::{RequestContext, Result};

use super::InventoryState;
use crate::models::{AuditAction, AuditFilter, AuditStats, InventoryAuditLog};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAuditQuery {
    pub warehouse_id: Option<Uuid>,
    #[serde(alias = "skuId")]
    pub sku: Option<String>,
    pub action: Option<AuditAction>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditListResponse {
    #[serde(flatten)]
    pub page: PageResponse<InventoryAuditLog>,
    pub stats: AuditStats,
}

pub async fn list_audit(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<ApiResponse<AuditListResponse>>> {
    let filter = AuditFilter {
        warehouse_id: query.warehouse_id,
        sku: query.sku,
        action: query.action,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let page = PageRequest::new(query.page.unwrap_or(1), query.page_size.unwrap_or(50));

    let (entries, total) = state.audit.list(&ctx, &filter, &page).await?;
    let stats = state.audit.stats(&ctx, &filter).await?;
    Ok(Json(ApiResponse::success(AuditListResponse {
        page: PageResponse::new(entries, total, &page),
        stats,
    })))
}
