use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campushub_core::{AggregateId, DomainError, DomainResult, Entity, TenantId, UserId};
use campushub_events::{DomainEvent, EventBuffer, EventPayload, EventSource};

/// Course identifier (tenant-scoped via the owning tenant on the entity).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub AggregateId);

impl CourseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CourseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Course publication lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Published,
}

/// A course offered by a tenant, with student enrollments.
#[derive(Debug, Clone)]
pub struct Course {
    id: CourseId,
    tenant_id: TenantId,
    title: String,
    status: CourseStatus,
    enrolled: HashSet<UserId>,
    created_at: DateTime<Utc>,
    events: EventBuffer,
}

impl Course {
    /// Create a new draft course. Records `course.created`.
    pub fn create(
        id: CourseId,
        tenant_id: TenantId,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("course title must not be empty"));
        }

        let mut course = Self {
            id,
            tenant_id,
            title: title.clone(),
            status: CourseStatus::Draft,
            enrolled: HashSet::new(),
            created_at: now,
            events: EventBuffer::new(),
        };

        course.record(now, EventPayload::CourseCreated { tenant_id, title });

        Ok(course)
    }

    /// Publish a draft course. Records `course.published`.
    pub fn publish(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            CourseStatus::Draft => {
                self.status = CourseStatus::Published;
                self.record(now, EventPayload::CoursePublished);
                Ok(())
            }
            CourseStatus::Published => Err(DomainError::conflict("course is already published")),
        }
    }

    /// Enroll a student into a published course. Records `course.enrolled`.
    pub fn enroll(&mut self, student_id: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != CourseStatus::Published {
            return Err(DomainError::invariant(
                "students can only enroll in published courses",
            ));
        }
        if !self.enrolled.insert(student_id) {
            return Err(DomainError::conflict("student is already enrolled"));
        }

        self.record(now, EventPayload::StudentEnrolled { student_id });
        Ok(())
    }

    pub fn course_id(&self) -> CourseId {
        self.id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.id.0
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> CourseStatus {
        self.status
    }

    pub fn enrolled(&self) -> &HashSet<UserId> {
        &self.enrolled
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn record(&mut self, now: DateTime<Utc>, payload: EventPayload) {
        self.events
            .record(DomainEvent::new(self.aggregate_id(), "course", now, payload));
    }
}

impl Entity for Course {
    type Id = CourseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl EventSource for Course {
    fn events(&self) -> &[DomainEvent] {
        self.events.events()
    }

    fn clear_events(&mut self) {
        self.events.clear();
    }

    fn clear_first_events(&mut self, count: usize) {
        self.events.clear_first(count);
    }
}
