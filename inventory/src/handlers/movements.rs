// ============================================================================
// MERIDIAN COMMERCE - MOVEMENT & UPDATE HANDLERS
// ============================================================================
// Module: inventory/src/handlers/movements.rs
// Description: HTTP handlers for stock movements and direct stock updates
// ============================================================================

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use meridian_shared::types::{ApiResponse, PageRequest, PageResponse};
use meridian_shared::{Error, RequestContext, Result};

use super::InventoryState;
use crate::models::{
    BulkUpdateItemResult, CreateMovementRequest, InventoryItem, MovementFilter, MovementStats,
    MovementStatus, MovementType, StockMovement, StockUpdateOutcome, StockUpdateRequest,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMovementsQuery {
    #[serde(rename = "type", alias = "movementType")]
    pub movement_type: Option<MovementType>,
    pub status: Option<MovementStatus>,
    pub warehouse_id: Option<Uuid>,
    #[serde(alias = "skuId")]
    pub sku: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MovementListResponse {
    #[serde(flatten)]
    pub page: PageResponse<StockMovement>,
    pub stats: MovementStats,
}

#[derive(Debug, Serialize)]
pub struct ExecutedMovementResponse {
    pub movement: StockMovement,
    pub stock: InventoryItem,
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateBody {
    #[serde(default)]
    pub atomic: bool,
    pub updates: Vec<StockUpdateRequest>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BulkUpdateResponse {
    Atomic(Vec<StockUpdateOutcome>),
    BestEffort(Vec<BulkUpdateItemResult>),
}

pub async fn create_movement(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<CreateMovementRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StockMovement>>)> {
    request
        .validate()
        .map_err(|e| Error::validation("body", e.to_string()))?;
    let movement = state.movements.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(movement))))
}

pub async fn get_movement(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(movement_id): Path<Uuid>,
) -> Result<Json<ApiResponse<StockMovement>>> {
    let movement = state.movements.get(&ctx, movement_id).await?;
    Ok(Json(ApiResponse::success(movement)))
}

pub async fn execute_movement(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(movement_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ExecutedMovementResponse>>> {
    let (movement, stock) = state.movements.execute(&ctx, movement_id).await?;
    Ok(Json(ApiResponse::success(ExecutedMovementResponse {
        movement,
        stock,
    })))
}

pub async fn cancel_movement(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(movement_id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> Result<Json<ApiResponse<StockMovement>>> {
    let movement = state
        .movements
        .cancel(&ctx, movement_id, &body.reason)
        .await?;
    Ok(Json(ApiResponse::success(movement)))
}

pub async fn list_movements(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ListMovementsQuery>,
) -> Result<Json<ApiResponse<MovementListResponse>>> {
    let filter = MovementFilter {
        movement_type: query.movement_type,
        status: query.status,
        warehouse_id: query.warehouse_id,
        sku: query.sku,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let page = PageRequest::new(query.page.unwrap_or(1), query.page_size.unwrap_or(50));

    let (page, stats) = state.movements.list(&ctx, &filter, &page).await?;
    Ok(Json(ApiResponse::success(MovementListResponse {
        page,
        stats,
    })))
}

pub async fn apply_update(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<StockUpdateRequest>,
) -> Result<Json<ApiResponse<StockUpdateOutcome>>> {
    let outcome = state.updates.apply(&ctx, request).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn apply_bulk_update(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<BulkUpdateBody>,
) -> Result<Json<ApiResponse<BulkUpdateResponse>>> {
    let response = if body.atomic {
        BulkUpdateResponse::Atomic(state.updates.apply_bulk_atomic(&ctx, body.updates).await?)
    } else {
        BulkUpdateResponse::BestEffort(
            state
                .updates
                .apply_bulk_best_effort(&ctx, body.updates)
                .await?,
        )
    };
    Ok(Json(ApiResponse::success(response)))
}
