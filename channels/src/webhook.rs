// ============================================================================
// MERIDIAN COMMERCE - WEBHOOK SIGNATURE VERIFICATION
// ============================================================================
// Module: channels/src/webhook.rs
// Description: HMAC-SHA256 verification of inbound storefront callbacks with
//              timing-safe comparison and channel status checks
// ============================================================================

use std::sync::Arc;

use axum::http::HeaderMap;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, warn};
use uuid::Uuid;

use meridian_shared::security::timing_safe_eq;
use meridian_shared::Result;

use crate::models::{ChannelStatus, ChannelType};
use crate::store::IntegrationStore;

type HmacSha256 = Hmac<Sha256>;

/// Verification input. `expected_org` engages the tenant check for callers
/// that already know which organization the webhook must belong to.
#[derive(Debug, Clone)]
pub struct VerifyRequest<'a> {
    pub channel_id: Uuid,
    pub channel_type: ChannelType,
    pub signature: Option<&'a str>,
    pub payload: &'a [u8],
    pub expected_org: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub valid: bool,
    pub channel_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub error: Option<String>,
    pub status_code: u16,
}

impl VerificationOutcome {
    fn ok(channel_id: Uuid, organization_id: Uuid) -> Self {
        Self {
            valid: true,
            channel_id: Some(channel_id),
            organization_id: Some(organization_id),
            error: None,
            status_code: 200,
        }
    }

    fn rejected(status_code: u16, error: &str) -> Self {
        Self {
            valid: false,
            channel_id: None,
            organization_id: None,
            error: Some(error.to_string()),
            status_code,
        }
    }
}

/// Compute the expected signature for a payload under a channel secret.
/// Exposed for tests and outbound webhook signing.
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Case-insensitive signature header lookup for a channel type.
pub fn extract_signature(headers: &HeaderMap, channel_type: ChannelType) -> Option<String> {
    headers
        .get(channel_type.signature_header())
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Proves an inbound payload originated from a channel whose secret we hold.
/// Verification is pure: replayed webhooks verify identically.
#[derive(Clone)]
pub struct WebhookVerifier {
    store: Arc<dyn IntegrationStore>,
}

impl WebhookVerifier {
    pub fn new(store: Arc<dyn IntegrationStore>) -> Self {
        Self { store }
    }

    pub async fn verify(&self, request: VerifyRequest<'_>) -> Result<VerificationOutcome> {
        let signature = match request.signature {
            Some(signature) if !signature.is_empty() => signature,
            _ => return Ok(VerificationOutcome::rejected(401, "missing signature")),
        };

        let channel = match self.store.get_channel(request.channel_id).await? {
            Some(channel) => channel,
            None => return Ok(VerificationOutcome::rejected(404, "channel not found")),
        };

        if let Some(expected_org) = request.expected_org {
            if channel.organization_id != expected_org {
                return Ok(VerificationOutcome::rejected(403, "organization mismatch"));
            }
        }

        if channel.status != ChannelStatus::Active {
            return Ok(VerificationOutcome::rejected(403, "inactive"));
        }

        if channel.channel_type != request.channel_type {
            return Ok(VerificationOutcome::rejected(400, "channel type mismatch"));
        }

        let secret = match channel.webhook_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                warn!(channel_id = %channel.id, "webhook secret not configured");
                return Ok(VerificationOutcome::rejected(500, "webhook secret not configured"));
            }
        };

        let expected = sign_payload(request.payload, secret);
        let provided = signature.as_bytes();

        let matches = if provided.len() != expected.len() {
            // Still burn one comparison so a length mismatch costs the same
            let dummy = vec![0u8; expected.len()];
            let _ = timing_safe_eq(&dummy, expected.as_bytes());
            false
        } else {
            timing_safe_eq(provided, expected.as_bytes())
        };

        if !matches {
            debug!(channel_id = %channel.id, "webhook signature mismatch");
            return Ok(VerificationOutcome::rejected(401, "invalid signature"));
        }

        Ok(VerificationOutcome::ok(channel.id, channel.organization_id))
    }
}
