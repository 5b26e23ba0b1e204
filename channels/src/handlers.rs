// ============================================================================
// MERIDIAN COMMERCE - WEBHOOK HANDLERS
// ============================================================================
// Module: channels/src/handlers.rs
// Description: Inbound storefront webhook routes. The body is taken as raw
//              bytes: re-serialized JSON would not match the HMAC.
// ============================================================================

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use meridian_shared::Result;

use crate::models::ChannelType;
use crate::webhook::{extract_signature, VerifyRequest, WebhookVerifier};

#[derive(Clone)]
pub struct ChannelsState {
    pub verifier: WebhookVerifier,
}

pub fn webhook_routes() -> Router<ChannelsState> {
    Router::new()
        .route("/webhooks/shopify/:channel_id", post(shopify_webhook))
        .route("/webhooks/woocommerce/:channel_id", post(woocommerce_webhook))
}

async fn shopify_webhook(
    State(state): State<ChannelsState>,
    Path(channel_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    handle_webhook(state, ChannelType::Shopify, channel_id, headers, body).await
}

async fn woocommerce_webhook(
    State(state): State<ChannelsState>,
    Path(channel_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    handle_webhook(state, ChannelType::Woocommerce, channel_id, headers, body).await
}

async fn handle_webhook(
    state: ChannelsState,
    channel_type: ChannelType,
    channel_id: Uuid,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let signature = extract_signature(&headers, channel_type);

    let outcome = state
        .verifier
        .verify(VerifyRequest {
            channel_id,
            channel_type,
            signature: signature.as_deref(),
            payload: &body,
            expected_org: None,
        })
        .await?;

    if outcome.valid {
        info!(channel_id = %channel_id, channel_type = %channel_type, "webhook accepted");
    }

    let status =
        StatusCode::from_u16(outcome.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(outcome)))
}
