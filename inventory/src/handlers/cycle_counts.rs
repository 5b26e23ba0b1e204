// ============================================================================
// MERIDIAN COMMERCE - CYCLE COUNT HANDLERS
// ============================================================================
// Module: inventory/src/handlers/cycle_counts.rs
// Description: HTTP handlers for cycle count sessions
// ============================================================================

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use meridian_shared::types::ApiResponse;
use meridian_shared::{Error, RequestContext, Result};

use super::InventoryState;
use crate::models::{
    CreateCycleCountRequest, CycleCount, CycleCountSession, StockUpdateOutcome, VarianceReport,
};
use crate::services::cycle_counts::CycleCountItemView;

#[derive(Debug, Deserialize)]
pub struct SubmitCountsBody {
    pub counts: Vec<CycleCount>,
}

#[derive(Debug, Serialize)]
pub struct CompletedSessionResponse {
    pub session: CycleCountSession,
    pub applied_updates: Vec<StockUpdateOutcome>,
}

pub async fn create_session(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<CreateCycleCountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CycleCountSession>>)> {
    request
        .validate()
        .map_err(|e| Error::validation("body", e.to_string()))?;
    let session = state.cycle_counts.create_session(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(session))))
}

pub async fn session_items(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<CycleCountItemView>>>> {
    let items = state.cycle_counts.session_items(&ctx, session_id).await?;
    Ok(Json(ApiResponse::success(items)))
}

pub async fn submit_counts(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<SubmitCountsBody>,
) -> Result<Json<ApiResponse<CycleCountSession>>> {
    let session = state
        .cycle_counts
        .submit_counts(&ctx, session_id, body.counts)
        .await?;
    Ok(Json(ApiResponse::success(session)))
}

pub async fn complete_session(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CompletedSessionResponse>>> {
    let (session, applied_updates) = state.cycle_counts.complete(&ctx, session_id).await?;
    Ok(Json(ApiResponse::success(CompletedSessionResponse {
        session,
        applied_updates,
    })))
}

pub async fn variance_report(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<RequestContext>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiResponse<VarianceReport>>> {
    let report = state.cycle_counts.variance_report(&ctx, session_id).await?;
    Ok(Json(ApiResponse::success(report)))
}
