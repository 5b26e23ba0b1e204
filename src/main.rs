// ============================================================================
// MERIDIAN COMMERCE - SERVER
// ============================================================================
// Module: src/main.rs
// Description: Binary entry point: configuration, tracing, storage wiring,
//              router composition and graceful shutdown
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meridian_channels::handlers::ChannelsState;
use meridian_channels::store::PgIntegrationStore;
use meridian_channels::webhook::WebhookVerifier;
use meridian_inventory::handlers::InventoryState;
use meridian_inventory::models::VarianceThresholds;
use meridian_inventory::services::{
    AuditLogger, CycleCountService, MovementPolicy, MovementService, StockUpdateService,
    TransferService,
};
use meridian_inventory::store::PgInventoryStore;
use meridian_shared::config::AppConfig;
use meridian_shared::events::RedisEventPublisher;

mod health;
mod worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meridian=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration is validated here; a missing or malformed encryption key
    // aborts startup
    let config = AppConfig::load()?;
    info!(environment = ?config.environment, "configuration loaded");

    let pool = meridian_shared::database::connect(&config.database).await?;
    info!("database connected");

    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    info!("redis connected");

    let publisher = Arc::new(RedisEventPublisher::new(redis_conn.clone()));

    // Inventory wiring
    let inventory_store = Arc::new(PgInventoryStore::new(pool.clone()));
    let thresholds = VarianceThresholds::default();
    let transfers = TransferService::new(inventory_store.clone(), publisher.clone());
    let inventory_state = InventoryState {
        movements: MovementService::new(
            inventory_store.clone(),
            publisher.clone(),
            MovementPolicy::default(),
        ),
        transfers: transfers.clone(),
        updates: StockUpdateService::new(inventory_store.clone(), thresholds),
        cycle_counts: CycleCountService::new(inventory_store.clone(), thresholds),
        audit: AuditLogger::new(inventory_store.clone()),
    };

    // Due scheduled transfers are executed by a background loop
    tokio::spawn(worker::run_scheduled_transfer_worker(transfers));

    let integration_store = Arc::new(PgIntegrationStore::new(pool.clone()));
    let channels_state = ChannelsState {
        verifier: WebhookVerifier::new(integration_store),
    };

    // Webhook routes stay outside the context middleware: they authenticate
    // by signature, not by gateway headers
    let app = Router::new()
        .nest(
            "/api/v1/inventory",
            meridian_inventory::handlers::inventory_routes()
                .with_state(inventory_state)
                .layer(middleware::from_fn(
                    meridian_shared::middleware::require_context,
                )),
        )
        .merge(meridian_channels::handlers::webhook_routes().with_state(channels_state))
        .route(
            "/health",
            axum::routing::get(health::health_check).with_state(health::HealthState {
                pool: pool.clone(),
                redis: redis_conn.clone(),
            }),
        )
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        );

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!(%addr, "meridian server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("meridian server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received, draining");
}
