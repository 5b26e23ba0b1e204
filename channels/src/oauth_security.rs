// ============================================================================
// MERIDIAN COMMERCE - OAUTH CALLBACK SECURITY
// ============================================================================
// Module: channels/src/oauth_security.rs
// Description: Anti-CSRF state issuance/consumption, per-IP rate limiting,
//              HTTPS enforcement and redirect-origin validation
// ============================================================================

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;
use uuid::Uuid;

use meridian_shared::cache::KeyValueStore;
use meridian_shared::config::{Environment, OAuthConfig};
use meridian_shared::{Error, Result};

pub const STATE_TTL_SECS: u64 = 600;
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const RATE_LIMIT_MAX_CALLBACKS: i64 = 10;

fn state_key(state: &str) -> String {
    format!("oauth:state:{state}")
}

fn rate_limit_key(ip: &str) -> String {
    format!("oauth:ratelimit:{}", sanitize_ip(ip))
}

fn sanitize_ip(ip: &str) -> String {
    ip.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '-' | '_'))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthStatePayload {
    pub organization_id: Uuid,
    pub provider: String,
    pub redirect_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub ip: Option<String>,
}

/// Cryptographically random, single-use OAuth state. State validation is
/// security-critical and fails closed on store outage.
#[derive(Clone)]
pub struct OAuthStateManager {
    store: Arc<dyn KeyValueStore>,
}

impl OAuthStateManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Issue a fresh 64-hex-char state and persist its payload for the
    /// callback to claim.
    pub async fn issue(
        &self,
        organization_id: Uuid,
        provider: &str,
        redirect_url: Option<String>,
        metadata: Option<serde_json::Value>,
        ip: Option<String>,
    ) -> Result<String> {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let state = hex::encode(raw);

        let payload = OAuthStatePayload {
            organization_id,
            provider: provider.to_string(),
            redirect_url,
            metadata,
            created_at: Utc::now(),
            ip,
        };
        self.store
            .set_ex(&state_key(&state), &serde_json::to_string(&payload)?, STATE_TTL_SECS)
            .await?;

        Ok(state)
    }

    /// Claim a state exactly once: read-and-delete, then re-check age as
    /// defense in depth against stores without reliable expiry.
    pub async fn consume(&self, state: &str) -> Result<OAuthStatePayload> {
        if !is_well_formed_state(state) {
            return Err(Error::validation("state", "invalid or expired state"));
        }

        let raw = self
            .store
            .get_del(&state_key(state))
            .await?
            .ok_or_else(|| Error::validation("state", "invalid or expired state"))?;

        let payload: OAuthStatePayload = serde_json::from_str(&raw)?;
        let age = Utc::now().signed_duration_since(payload.created_at);
        if age.num_seconds() > STATE_TTL_SECS as i64 {
            return Err(Error::validation("state", "invalid or expired state"));
        }

        Ok(payload)
    }
}

fn is_well_formed_state(state: &str) -> bool {
    state.len() == 64
        && state
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Sliding per-IP window over the shared store. A store outage fails open:
/// losing rate limiting is preferable to rejecting every callback.
#[derive(Clone)]
pub struct CallbackRateLimiter {
    store: Arc<dyn KeyValueStore>,
}

impl CallbackRateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn check(&self, ip: &str) -> Result<()> {
        let key = rate_limit_key(ip);

        let count = match self.store.incr_with_ttl(&key, RATE_LIMIT_WINDOW_SECS).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "rate limit store unavailable; failing open");
                return Ok(());
            }
        };

        if count > RATE_LIMIT_MAX_CALLBACKS {
            let retry_after_secs = self
                .store
                .ttl(&key)
                .await
                .ok()
                .flatten()
                .unwrap_or(RATE_LIMIT_WINDOW_SECS);
            return Err(Error::RateLimited { retry_after_secs });
        }

        Ok(())
    }
}

/// Effective protocol, preferring the proxy-forwarded value over the raw
/// connection scheme.
pub fn effective_protocol<'a>(headers: &'a HeaderMap, raw_scheme: &'a str) -> &'a str {
    headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(raw_scheme)
}

/// In production the callback must arrive over HTTPS.
pub fn require_https(headers: &HeaderMap, raw_scheme: &str, environment: Environment) -> Result<()> {
    if environment.is_production() && effective_protocol(headers, raw_scheme) != "https" {
        return Err(Error::validation("protocol", "HTTPS is required"));
    }
    Ok(())
}

/// Redirect targets are constrained to an allow-listed set of origins.
#[derive(Clone)]
pub struct RedirectValidator {
    allowed_origins: Vec<String>,
    fallback: String,
}

impl RedirectValidator {
    pub fn new(config: &OAuthConfig, environment: Environment) -> Self {
        let allowed_origins = config
            .redirect_allow_list(environment)
            .iter()
            .filter_map(|entry| normalize_origin(entry))
            .collect();
        Self {
            allowed_origins,
            fallback: config.fallback_redirect.clone(),
        }
    }

    pub fn is_allowed(&self, candidate: &str) -> bool {
        match normalize_origin(candidate) {
            Some(origin) => self.allowed_origins.contains(&origin),
            None => false,
        }
    }

    pub fn validate(&self, candidate: &str) -> Result<()> {
        if self.is_allowed(candidate) {
            Ok(())
        } else {
            Err(Error::validation("redirect_url", "origin is not allow-listed"))
        }
    }

    /// The candidate when its origin is allow-listed, the configured
    /// fallback otherwise.
    pub fn safe_redirect(&self, candidate: &str) -> String {
        if self.is_allowed(candidate) {
            candidate.to_string()
        } else {
            self.fallback.clone()
        }
    }
}

fn normalize_origin(input: &str) -> Option<String> {
    let url = Url::parse(input).ok()?;
    let origin = url.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}
