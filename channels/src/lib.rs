// ============================================================================
// MERIDIAN COMMERCE - CHANNEL & CARRIER INTEGRATIONS
// ============================================================================
// Module: channels/src/lib.rs
// Description: Carrier OAuth token fleet, circuit breaking, webhook signature
//              verification and OAuth callback security
// ============================================================================

pub mod circuit_breaker;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod oauth_security;
pub mod store;
pub mod token;
pub mod webhook;

pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerRegistry};
pub use gateway::CarrierGateway;
pub use handlers::{webhook_routes, ChannelsState};
pub use oauth_security::{CallbackRateLimiter, OAuthStateManager, RedirectValidator};
pub use store::{IntegrationStore, MemoryIntegrationStore, PgIntegrationStore};
pub use token::{TokenError, TokenFleet};
pub use webhook::{VerificationOutcome, VerifyRequest, WebhookVerifier};
