// ============================================================================
// MERIDIAN COMMERCE - CARRIER OAUTH TOKEN FLEET
// ============================================================================
// Module: channels/src/token.rs
// Description: Per-account access token acquisition with Redis caching,
//              stampede protection and credential-failure classification
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use meridian_shared::cache::KeyValueStore;
use meridian_shared::security::CredentialCipher;

use crate::models::{AccountStatus, CarrierCredentials, ShippingAccount};
use crate::store::IntegrationStore;

/// An in-flight acquisition older than this is presumed dead and bypassed.
pub const LOCK_EXPIRY_MS: u64 = 30_000;

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const TOKEN_TTL_BUFFER_SECS: i64 = 300;
const MIN_TOKEN_TTL_SECS: i64 = 60;
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("shipping account has no usable client credentials")]
    MissingCredentials,

    #[error("carrier rejected the credentials (HTTP {status_code}); account flagged for re-auth")]
    NeedsReauth { status_code: u16 },

    #[error("carrier rate limited the token request (HTTP {status_code})")]
    RateLimited { status_code: u16 },

    #[error("carrier token endpoint failed (HTTP {status_code})")]
    ServerError { status_code: u16 },

    #[error("token request was refused (HTTP {status_code})")]
    TokenRequestFailed { status_code: u16 },

    #[error("carrier token response was not valid JSON")]
    InvalidResponse,

    #[error("carrier token response carried no access token")]
    EmptyToken,

    #[error("token request timed out")]
    Timeout,

    #[error("network error during token request: {0}")]
    Network(String),
}

impl TokenError {
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::MissingCredentials => "MISSING_CREDENTIALS",
            TokenError::NeedsReauth { .. } => "NEEDS_REAUTH",
            TokenError::RateLimited { .. } => "RATE_LIMITED",
            TokenError::ServerError { .. } => "SERVER_ERROR",
            TokenError::TokenRequestFailed { .. } => "TOKEN_REQUEST_FAILED",
            TokenError::InvalidResponse => "INVALID_RESPONSE",
            TokenError::EmptyToken => "EMPTY_TOKEN",
            TokenError::Timeout => "TIMEOUT",
            TokenError::Network(_) => "NETWORK_ERROR",
        }
    }

    /// Upstream HTTP status, where one was observed.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TokenError::NeedsReauth { status_code }
            | TokenError::RateLimited { status_code }
            | TokenError::ServerError { status_code }
            | TokenError::TokenRequestFailed { status_code } => Some(*status_code),
            _ => None,
        }
    }

    /// Transient errors are retryable and feed the circuit breaker; the rest
    /// need operator action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TokenError::RateLimited { .. }
                | TokenError::ServerError { .. }
                | TokenError::Timeout
                | TokenError::Network(_)
        )
    }
}

impl From<TokenError> for meridian_shared::Error {
    fn from(err: TokenError) -> Self {
        if err.is_transient() {
            meridian_shared::Error::CarrierUnavailable(err.to_string())
        } else {
            meridian_shared::Error::Internal(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Produces valid bearer tokens for carrier accounts while keeping upstream
/// traffic minimal: Redis cache with an expiry buffer, and a per-account
/// in-process lock so concurrent acquisitions collapse into one fetch.
pub struct TokenFleet {
    store: Arc<dyn IntegrationStore>,
    cache: Arc<dyn KeyValueStore>,
    cipher: CredentialCipher,
    http: reqwest::Client,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    request_timeout: Duration,
    endpoint_override: Option<String>,
}

impl TokenFleet {
    pub fn new(
        store: Arc<dyn IntegrationStore>,
        cache: Arc<dyn KeyValueStore>,
        cipher: CredentialCipher,
    ) -> Self {
        Self {
            store,
            cache,
            cipher,
            http: reqwest::Client::new(),
            locks: Mutex::new(HashMap::new()),
            request_timeout: TOKEN_REQUEST_TIMEOUT,
            endpoint_override: None,
        }
    }

    /// Route all token requests to a fixed URL (tests).
    pub fn with_endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    /// Shorten the upstream timeout (tests).
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn cache_key(account: &ShippingAccount) -> String {
        format!("{}:token:{}", account.carrier.as_key(), account.id)
    }

    /// Acquire a bearer token: cache first, then a locked upstream fetch with
    /// a double-checked cache read so a stampede costs one request.
    pub async fn get_access_token(
        &self,
        account: &ShippingAccount,
    ) -> Result<String, TokenError> {
        let key = Self::cache_key(account);
        if let Some(token) = self.cached(&key).await {
            return Ok(token);
        }

        let lock = self.account_lock(account.id);
        let _guard = match timeout(Duration::from_millis(LOCK_EXPIRY_MS), lock.lock()).await {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!(account_id = %account.id, "token lock held past expiry; proceeding");
                None
            }
        };

        // A concurrent holder may have filled the cache while we waited
        if let Some(token) = self.cached(&key).await {
            return Ok(token);
        }

        self.fetch_and_cache(account, &key).await
    }

    /// A downstream 401 means the cached token is stale or revoked: drop it
    /// and fetch a fresh one. Callers retry the downstream call at most once.
    pub async fn handle_unauthorized(
        &self,
        account: &ShippingAccount,
    ) -> Result<String, TokenError> {
        let key = Self::cache_key(account);
        if let Err(e) = self.cache.del(&key).await {
            warn!(account_id = %account.id, error = %e, "failed to evict cached token");
        }

        let lock = self.account_lock(account.id);
        let _guard = match timeout(Duration::from_millis(LOCK_EXPIRY_MS), lock.lock()).await {
            Ok(guard) => Some(guard),
            Err(_) => None,
        };

        self.fetch_and_cache(account, &key).await
    }

    async fn fetch_and_cache(
        &self,
        account: &ShippingAccount,
        key: &str,
    ) -> Result<String, TokenError> {
        let (token, expires_in) = self.fetch_token(account).await?;

        let ttl = (expires_in - TOKEN_TTL_BUFFER_SECS).max(MIN_TOKEN_TTL_SECS);
        if let Err(e) = self.cache.set_ex(key, &token, ttl as u64).await {
            // Cache loss degrades to refetching, never to failure
            warn!(account_id = %account.id, error = %e, "failed to cache token");
        }

        info!(
            account_id = %account.id,
            carrier = %account.carrier,
            ttl_secs = ttl,
            "carrier token acquired"
        );
        Ok(token)
    }

    async fn fetch_token(&self, account: &ShippingAccount) -> Result<(String, i64), TokenError> {
        let credentials = self.decrypt_credentials(account)?;
        let endpoint = self.token_endpoint(account);

        debug!(account_id = %account.id, carrier = %account.carrier, "requesting carrier token");

        let response = self
            .http
            .post(&endpoint)
            .timeout(self.request_timeout)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TokenError::Timeout
                } else {
                    TokenError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(match status {
                401 | 403 => {
                    self.mark_needs_reauth(account).await;
                    TokenError::NeedsReauth {
                        status_code: status,
                    }
                }
                429 => TokenError::RateLimited {
                    status_code: status,
                },
                500..=599 => TokenError::ServerError {
                    status_code: status,
                },
                _ => TokenError::TokenRequestFailed {
                    status_code: status,
                },
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|_| TokenError::InvalidResponse)?;

        let token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(TokenError::EmptyToken)?;
        let expires_in = body
            .expires_in
            .filter(|expires| *expires > 0)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS);

        Ok((token, expires_in))
    }

    fn decrypt_credentials(
        &self,
        account: &ShippingAccount,
    ) -> Result<CarrierCredentials, TokenError> {
        if account.encrypted_client_id.is_empty() || account.encrypted_client_secret.is_empty() {
            return Err(TokenError::MissingCredentials);
        }

        let client_id = self
            .cipher
            .decrypt_from_string(&account.encrypted_client_id)
            .map_err(|_| TokenError::MissingCredentials)?;
        let client_secret = self
            .cipher
            .decrypt_from_string(&account.encrypted_client_secret)
            .map_err(|_| TokenError::MissingCredentials)?;

        if client_id.is_empty() || client_secret.is_empty() {
            return Err(TokenError::MissingCredentials);
        }

        Ok(CarrierCredentials {
            client_id,
            client_secret,
        })
    }

    async fn mark_needs_reauth(&self, account: &ShippingAccount) {
        if let Err(e) = self
            .store
            .set_account_status(account.id, AccountStatus::NeedsReauth)
            .await
        {
            error!(account_id = %account.id, error = %e, "failed to flag account for re-auth");
        }
    }

    fn token_endpoint(&self, account: &ShippingAccount) -> String {
        match &self.endpoint_override {
            Some(endpoint) => endpoint.clone(),
            None => account.carrier.token_endpoint(account.test_mode).to_string(),
        }
    }

    async fn cached(&self, key: &str) -> Option<String> {
        match self.cache.get(key).await {
            Ok(token) => token,
            Err(e) => {
                // Cache outage: miss and refetch
                warn!(key = %key, error = %e, "token cache read failed; fetching upstream");
                None
            }
        }
    }

    fn account_lock(&self, account_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
