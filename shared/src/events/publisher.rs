// ============================================================================
// MERIDIAN COMMERCE - EVENT PUBLISHER
// ============================================================================
// Module: shared/src/events/publisher.rs
// Description: Redis-based event publishing with a capture double for tests
// ============================================================================

use std::sync::Mutex;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, warn};

use super::DomainEvent;
use crate::error::Result;

/// Publishing contract. Services hold `Arc<dyn EventPublisher>` so tests can
/// capture emissions in memory.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<()>;
}

/// Publishes to the aggregate topic and the tenant topic, and appends to the
/// aggregate stream for replay. Stream retention is bounded with a TTL.
pub struct RedisEventPublisher {
    conn: ConnectionManager,
    stream_ttl_secs: u64,
}

const DEFAULT_STREAM_TTL_SECS: u64 = 30 * 24 * 60 * 60;

impl RedisEventPublisher {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            stream_ttl_secs: DEFAULT_STREAM_TTL_SECS,
        }
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();

        redis::cmd("PUBLISH")
            .arg(event.topic())
            .arg(&payload)
            .query_async::<_, i64>(&mut conn)
            .await?;

        redis::cmd("PUBLISH")
            .arg(event.tenant_topic())
            .arg(&payload)
            .query_async::<_, i64>(&mut conn)
            .await?;

        let stream = event.stream_name();
        redis::cmd("XADD")
            .arg(&stream)
            .arg("*")
            .arg("event")
            .arg(&payload)
            .arg("type")
            .arg(&event.event_type)
            .arg("organization_id")
            .arg(event.organization_id.to_string())
            .query_async::<_, String>(&mut conn)
            .await?;

        // Retention only; a failed EXPIRE must not fail the publish
        if let Err(e) = redis::cmd("EXPIRE")
            .arg(&stream)
            .arg(self.stream_ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
        {
            warn!(stream = %stream, error = %e, "failed to set event stream TTL");
        }

        debug!(event_type = %event.event_type, topic = %event.topic(), "event published");
        Ok(())
    }
}

/// Test double that records every published event in order.
#[derive(Default)]
pub struct CapturingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl CapturingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events
            .lock()
            .expect("publisher poisoned")
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().expect("publisher poisoned").clone()
    }

    pub fn take(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock().expect("publisher poisoned"))
    }
}

#[async_trait]
impl EventPublisher for CapturingPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        self.events
            .lock()
            .expect("publisher poisoned")
            .push(event.clone());
        Ok(())
    }
}
