// End-to-end webhook verification through the router, raw body and all.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use meridian_channels::handlers::{webhook_routes, ChannelsState};
use meridian_channels::models::{Channel, ChannelStatus, ChannelType};
use meridian_channels::store::MemoryIntegrationStore;
use meridian_channels::webhook::{sign_payload, WebhookVerifier};

fn app(store: Arc<MemoryIntegrationStore>) -> axum::Router {
    webhook_routes().with_state(ChannelsState {
        verifier: WebhookVerifier::new(store),
    })
}

fn seed_channel(store: &MemoryIntegrationStore, channel_type: ChannelType, secret: &str) -> Channel {
    let channel = Channel {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        channel_type,
        status: ChannelStatus::Active,
        webhook_secret: Some(secret.to_string()),
    };
    store.seed_channel(channel.clone());
    channel
}

async fn post_webhook(
    app: axum::Router,
    uri: &str,
    header: Option<(&str, &str)>,
    body: &'static [u8],
) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().method("POST").uri(uri);
    if let Some((name, value)) = header {
        request = request.header(name, value);
    }
    let response = app
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn shopify_webhook_round_trip() {
    let store = Arc::new(MemoryIntegrationStore::new());
    let channel = seed_channel(&store, ChannelType::Shopify, "s");

    let payload: &'static [u8] = br#"{"id":12345}"#;
    let signature = sign_payload(payload, "s");

    let (status, body) = post_webhook(
        app(store.clone()),
        &format!("/webhooks/shopify/{}", channel.id),
        Some(("X-Shopify-Hmac-Sha256", &signature)),
        payload,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["organization_id"], channel.organization_id.to_string());

    // Same signature over a different payload is rejected
    let (status, body) = post_webhook(
        app(store.clone()),
        &format!("/webhooks/shopify/{}", channel.id),
        Some(("X-Shopify-Hmac-Sha256", &signature)),
        br#"{"id":99999}"#,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn lowercase_header_is_accepted() {
    let store = Arc::new(MemoryIntegrationStore::new());
    let channel = seed_channel(&store, ChannelType::Woocommerce, "wc-secret");

    let payload: &'static [u8] = br#"{"order":1}"#;
    let signature = sign_payload(payload, "wc-secret");

    let (status, body) = post_webhook(
        app(store),
        &format!("/webhooks/woocommerce/{}", channel.id),
        Some(("x-wc-webhook-signature", &signature)),
        payload,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
}

#[tokio::test]
async fn missing_header_and_unknown_channel() {
    let store = Arc::new(MemoryIntegrationStore::new());
    let channel = seed_channel(&store, ChannelType::Shopify, "s");

    let (status, _) = post_webhook(
        app(store.clone()),
        &format!("/webhooks/shopify/{}", channel.id),
        None,
        b"{}",
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_webhook(
        app(store),
        &format!("/webhooks/shopify/{}", Uuid::new_v4()),
        Some(("X-Shopify-Hmac-Sha256", "sig")),
        b"{}",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inactive_channel_rejects_valid_signature() {
    let store = Arc::new(MemoryIntegrationStore::new());
    let mut channel = seed_channel(&store, ChannelType::Shopify, "s");
    channel.status = ChannelStatus::Inactive;
    store.seed_channel(channel.clone());

    let payload: &'static [u8] = br#"{"id":12345}"#;
    let signature = sign_payload(payload, "s");

    let (status, body) = post_webhook(
        app(store),
        &format!("/webhooks/shopify/{}", channel.id),
        Some(("X-Shopify-Hmac-Sha256", &signature)),
        payload,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "inactive");
}
