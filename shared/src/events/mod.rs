// ============================================================================
// MERIDIAN COMMERCE - EVENT SYSTEM
// ============================================================================
// Module: shared/src/events/mod.rs
// Description: Domain event definitions and publishing contract
// ============================================================================

pub mod publisher;

pub use publisher::{CapturingPublisher, EventPublisher, RedisEventPublisher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event names emitted by the transactional core.
pub mod names {
    pub const MOVEMENT_COMPLETED: &str = "movement.completed";
    pub const TRANSFER_REQUESTED: &str = "transfer.requested";
    pub const TRANSFER_APPROVED: &str = "transfer.approved";
    pub const TRANSFER_REJECTED: &str = "transfer.rejected";
    pub const TRANSFER_COMPLETED: &str = "transfer.completed";
    pub const NOTIFICATION_BATCH: &str = "notification.batch";
    pub const NOTIFICATION_SEND: &str = "notification.send";
}

/// Base domain event structure. Events are emitted strictly after the owning
/// transaction commits, so consumers never observe unwritten state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub organization_id: Uuid,
    pub data: serde_json::Value,
    pub metadata: EventMetadata,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    pub user_id: Option<Uuid>,
    pub correlation_id: Uuid,
    pub source_service: String,
}

impl DomainEvent {
    pub fn builder(
        event_type: impl Into<String>,
        aggregate_id: Uuid,
        aggregate_type: impl Into<String>,
        organization_id: Uuid,
    ) -> DomainEventBuilder {
        DomainEventBuilder {
            event_type: event_type.into(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            organization_id,
            data: serde_json::Value::Null,
            user_id: None,
        }
    }

    /// Topic for pub/sub routing.
    pub fn topic(&self) -> String {
        format!(
            "events.{}.{}",
            self.aggregate_type.to_lowercase(),
            self.event_type
        )
    }

    /// Tenant-scoped topic.
    pub fn tenant_topic(&self) -> String {
        format!("events.tenant.{}.{}", self.organization_id, self.event_type)
    }

    /// Stream used for replay.
    pub fn stream_name(&self) -> String {
        format!("{}-{}", self.aggregate_type.to_lowercase(), self.aggregate_id)
    }
}

pub struct DomainEventBuilder {
    event_type: String,
    aggregate_id: Uuid,
    aggregate_type: String,
    organization_id: Uuid,
    data: serde_json::Value,
    user_id: Option<Uuid>,
}

impl DomainEventBuilder {
    pub fn data<T: Serialize>(mut self, data: T) -> crate::Result<Self> {
        self.data = serde_json::to_value(data)?;
        Ok(self)
    }

    pub fn user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn build(self) -> DomainEvent {
        DomainEvent {
            id: Uuid::new_v4(),
            event_type: self.event_type,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            organization_id: self.organization_id,
            data: self.data,
            metadata: EventMetadata {
                user_id: self.user_id,
                correlation_id: Uuid::new_v4(),
                source_service: "meridian-core".to_string(),
            },
            occurred_at: Utc::now(),
        }
    }
}
