use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campushub_core::{AggregateId, EventId, TenantId, UserId};

/// A domain event: an immutable fact describing something that happened to an
/// entity.
///
/// Events are:
/// - **immutable** (private fields, accessors only — treat them as facts)
/// - **ordered** per entity (insertion order in the entity's buffer)
/// - intended for asynchronous side-effect propagation
///
/// Wire shape (camelCase, payload flattened):
/// `{ eventId, aggregateId, aggregateType, occurredAt, kind, ...fields }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    event_id: EventId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    payload: EventPayload,
}

impl DomainEvent {
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Stable event kind identifier (e.g. "tenant.created").
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Platform event catalog: tagged variants carrying event-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventPayload {
    #[serde(rename = "tenant.created")]
    TenantCreated { name: String, plan: String },

    #[serde(rename = "tenant.activated")]
    TenantActivated,

    #[serde(rename = "tenant.deactivated")]
    TenantDeactivated { reason: Option<String> },

    #[serde(rename = "course.created")]
    CourseCreated { tenant_id: TenantId, title: String },

    #[serde(rename = "course.published")]
    CoursePublished,

    #[serde(rename = "course.enrolled")]
    StudentEnrolled { student_id: UserId },
}

impl EventPayload {
    /// Stable event kind identifier, used for subscriber registration.
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::TenantCreated { .. } => "tenant.created",
            EventPayload::TenantActivated => "tenant.activated",
            EventPayload::TenantDeactivated { .. } => "tenant.deactivated",
            EventPayload::CourseCreated { .. } => "course.created",
            EventPayload::CoursePublished => "course.published",
            EventPayload::StudentEnrolled { .. } => "course.enrolled",
        }
    }
}
