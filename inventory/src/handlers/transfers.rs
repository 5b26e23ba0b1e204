// ============================================================================
// MERIDIAN COMMERCE - TRANSFER HANDLERS
// ============================================================================
// Module: inventory/src/handlers/transfers.rs
// Description: HTTP handlers for the transfer workflow
// ============================================================================

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use meridian_shared::types::ApiResponse;
use meridian_shared::{Error, RequestContext, Result};

use super::InventoryState;
use crate::models::{CreateTransferRequest, InventoryItem, TransferRequest};

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleBody {
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CompletedTransferResponse {
    pub transfer: TransferRequest,
    pub source_stock: InventoryItem,
    pub target_stock: InventoryItem,
}

pub async fn create_transfer(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<CreateTransferRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransferRequest>>)> {
    request
        .validate()
        .map_err(|e| Error::validation("body", e.to_string()))?;
    let transfer = state.transfers.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(transfer))))
}

pub async fn approve_transfer(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(transfer_id): Path<Uuid>,
) -> Result<Json<ApiResponse<TransferRequest>>> {
    let transfer = state.transfers.approve(&ctx, transfer_id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

pub async fn reject_transfer(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(transfer_id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> Result<Json<ApiResponse<TransferRequest>>> {
    let transfer = state
        .transfers
        .reject(&ctx, transfer_id, &body.reason)
        .await?;
    Ok(Json(ApiResponse::success(transfer)))
}

pub async fn cancel_transfer(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(transfer_id): Path<Uuid>,
) -> Result<Json<ApiResponse<TransferRequest>>> {
    let transfer = state.transfers.cancel(&ctx, transfer_id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

pub async fn complete_transfer(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(transfer_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CompletedTransferResponse>>> {
    let execution = state.transfers.execute(&ctx, transfer_id).await?;
    Ok(Json(ApiResponse::success(CompletedTransferResponse {
        transfer: execution.transfer,
        source_stock: execution.source_item,
        target_stock: execution.target_item,
    })))
}

pub async fn reschedule_transfer(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(transfer_id): Path<Uuid>,
    Json(body): Json<RescheduleBody>,
) -> Result<Json<ApiResponse<TransferRequest>>> {
    let transfer = state
        .transfers
        .reschedule(&ctx, transfer_id, body.scheduled_at)
        .await?;
    Ok(Json(ApiResponse::success(transfer)))
}
