// ============================================================================
// MERIDIAN COMMERCE - CARRIER GATEWAY
// ============================================================================
// Module: channels/src/gateway.rs
// Description: Outbound carrier call path: breaker admission, bearer token
//              injection, single retry after an upstream 401
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use meridian_shared::{Error, Result};

use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::models::ShippingAccount;
use crate::token::TokenFleet;

/// Shared entry point for every outbound carrier API call (labels, rates,
/// pickups). The closure receives a bearer token and performs the call;
/// an `Unauthorized` result triggers one token refresh and one retry.
pub struct CarrierGateway {
    fleet: Arc<TokenFleet>,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl CarrierGateway {
    pub fn new(fleet: Arc<TokenFleet>, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self { fleet, breakers }
    }

    pub async fn call<T, F, Fut>(&self, account: &ShippingAccount, op: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.breakers.for_carrier(account.carrier);

        breaker
            .call(|| async {
                let token = self.fleet.get_access_token(account).await?;

                match op(token).await {
                    Err(Error::Unauthorized(_)) => {
                        // Stale or revoked token: refresh and retry exactly once
                        info!(
                            account_id = %account.id,
                            carrier = %account.carrier,
                            "carrier call unauthorized, refreshing token"
                        );
                        let fresh = self.fleet.handle_unauthorized(account).await?;
                        op(fresh).await
                    }
                    other => other,
                }
            })
            .await
    }
}
