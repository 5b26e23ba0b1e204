// ============================================================================
// MERIDIAN COMMERCE - HEALTH ENDPOINT
// ============================================================================
// Module: src/health.rs
// Description: Liveness plus database and Redis reachability
// ============================================================================

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Clone)]
pub struct HealthState {
    pub pool: PgPool,
    pub redis: ConnectionManager,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    pub redis: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub async fn health_check(State(state): State<HealthState>) -> (StatusCode, Json<HealthStatus>) {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "up",
        Err(_) => "down",
    };

    let mut redis_conn = state.redis.clone();
    let redis = match redis::cmd("PING")
        .query_async::<_, String>(&mut redis_conn)
        .await
    {
        Ok(_) => "up",
        Err(_) => "down",
    };

    let healthy = database == "up" && redis == "up";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthStatus {
            status: if healthy { "healthy" } else { "degraded" },
            database,
            redis,
            timestamp: Utc::now(),
        }),
    )
}
