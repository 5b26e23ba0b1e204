// Carrier gateway composition: breaker admission, token injection, 401 retry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use meridian_channels::circuit_breaker::CircuitBreakerRegistry;
use meridian_channels::gateway::CarrierGateway;
use meridian_channels::models::{AccountStatus, Carrier, ShippingAccount};
use meridian_channels::store::MemoryIntegrationStore;
use meridian_channels::token::TokenFleet;
use meridian_shared::cache::MemoryStore;
use meridian_shared::security::CredentialCipher;
use meridian_shared::Error;

fn cipher() -> CredentialCipher {
    CredentialCipher::from_hex_key(&"ab".repeat(32)).unwrap()
}

struct Fixture {
    gateway: CarrierGateway,
    account: ShippingAccount,
    server: MockServer,
}

async fn fixture() -> Fixture {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryIntegrationStore::new());
    let cipher = cipher();

    let account = ShippingAccount {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        carrier: Carrier::Dhl,
        account_number: "DE1234".to_string(),
        test_mode: true,
        encrypted_client_id: cipher.encrypt_to_string("client-id").unwrap(),
        encrypted_client_secret: cipher.encrypt_to_string("client-secret").unwrap(),
        status: AccountStatus::Active,
    };
    store.seed_account(account.clone());

    let fleet = Arc::new(
        TokenFleet::new(store, Arc::new(MemoryStore::new()), cipher)
            .with_endpoint_override(format!("{}/auth/accesstoken", server.uri())),
    );
    let gateway = CarrierGateway::new(fleet, Arc::new(CircuitBreakerRegistry::new()));

    Fixture {
        gateway,
        account,
        server,
    }
}

#[tokio::test]
async fn injects_bearer_token_into_calls() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "T1", "expires_in": 3600})),
        )
        .mount(&f.server)
        .await;

    let label = f
        .gateway
        .call(&f.account, |token| async move {
            assert_eq!(token, "T1");
            Ok::<_, Error>("label-data".to_string())
        })
        .await
        .unwrap();
    assert_eq!(label, "label-data");
}

#[tokio::test]
async fn unauthorized_downstream_is_retried_exactly_once() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "T1", "expires_in": 3600})),
        )
        .up_to_n_times(1)
        .mount(&f.server)
        .await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "T2", "expires_in": 3600})),
        )
        .mount(&f.server)
        .await;

    let attempts = Arc::new(AtomicU32::new(0));

    let result = f
        .gateway
        .call(&f.account, |token| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                if token == "T1" {
                    Err(Error::Unauthorized("token expired".to_string()))
                } else {
                    Ok(format!("ok with {token}"))
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(result, "ok with T2");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn persistent_unauthorized_fails_after_one_retry() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "T1", "expires_in": 3600})),
        )
        .mount(&f.server)
        .await;

    let attempts = Arc::new(AtomicU32::new(0));

    let err = f
        .gateway
        .call(&f.account, |_token| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::Unauthorized("still bad".to_string()))
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Unauthorized(_)));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn breaker_short_circuits_after_sustained_failures() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "T1", "expires_in": 3600})),
        )
        .mount(&f.server)
        .await;

    let attempts = Arc::new(AtomicU32::new(0));

    for _ in 0..5 {
        let err = f
            .gateway
            .call(&f.account, |_token| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Error::Internal("carrier 500".to_string()))
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    // Breaker is open: the call fails fast without reaching the closure
    let err = f
        .gateway
        .call(&f.account, |_token| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(())
            }
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CarrierUnavailable(_)));
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
}
