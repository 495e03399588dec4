//! Side-effect subscribers fed by the event relay.
//!
//! Delivery is at-least-once, so every subscriber here deduplicates on the
//! event id before acting.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use campushub_auth::RequestContext;
use campushub_core::{AggregateId, EventId};
use campushub_events::{DomainEvent, DomainEventHandler, EventPayload};

/// One row of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub event_id: EventId,
    pub kind: &'static str,
    pub aggregate_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Records every delivered event. Registered for all event kinds.
#[derive(Debug, Default)]
pub struct AuditTrailSubscriber {
    entries: Mutex<Vec<AuditEntry>>,
    seen: Mutex<HashSet<EventId>>,
}

impl AuditTrailSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DomainEventHandler for AuditTrailSubscriber {
    fn name(&self) -> &'static str {
        "audit-trail"
    }

    async fn handle(&self, _ctx: &RequestContext, event: &DomainEvent) -> anyhow::Result<()> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| anyhow::anyhow!("audit seen-set lock poisoned"))?;
        if !seen.insert(event.event_id()) {
            return Ok(());
        }

        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("audit trail lock poisoned"))?
            .push(AuditEntry {
                event_id: event.event_id(),
                kind: event.kind(),
                aggregate_id: event.aggregate_id(),
                occurred_at: event.occurred_at(),
            });
        Ok(())
    }
}

/// Greets freshly created tenants. Registered for `tenant.created`.
#[derive(Debug, Default)]
pub struct WelcomeNotificationSubscriber {
    greeted: Mutex<HashSet<AggregateId>>,
    sent: Mutex<Vec<String>>,
}

impl WelcomeNotificationSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DomainEventHandler for WelcomeNotificationSubscriber {
    fn name(&self) -> &'static str {
        "welcome-notification"
    }

    async fn handle(&self, _ctx: &RequestContext, event: &DomainEvent) -> anyhow::Result<()> {
        let EventPayload::TenantCreated { name, .. } = event.payload() else {
            return Ok(());
        };

        let mut greeted = self
            .greeted
            .lock()
            .map_err(|_| anyhow::anyhow!("greeted-set lock poisoned"))?;
        if !greeted.insert(event.aggregate_id()) {
            return Ok(());
        }

        info!(tenant = %name, "sending welcome notification");
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("sent-list lock poisoned"))?
            .push(name.clone());
        Ok(())
    }
}

/// Maintains a per-course enrollment count read model. Registered for
/// `course.enrolled`.
#[derive(Debug, Default)]
pub struct EnrollmentCounterSubscriber {
    counts: Mutex<HashMap<AggregateId, u64>>,
    seen: Mutex<HashSet<EventId>>,
}

impl EnrollmentCounterSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, course: AggregateId) -> u64 {
        self.counts
            .lock()
            .map(|c| c.get(&course).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl DomainEventHandler for EnrollmentCounterSubscriber {
    fn name(&self) -> &'static str {
        "enrollment-counter"
    }

    async fn handle(&self, _ctx: &RequestContext, event: &DomainEvent) -> anyhow::Result<()> {
        if !matches!(event.payload(), EventPayload::StudentEnrolled { .. }) {
            return Ok(());
        }

        let mut seen = self
            .seen
            .lock()
            .map_err(|_| anyhow::anyhow!("seen-set lock poisoned"))?;
        if !seen.insert(event.event_id()) {
            return Ok(());
        }

        *self
            .counts
            .lock()
            .map_err(|_| anyhow::anyhow!("counts lock poisoned"))?
            .entry(event.aggregate_id())
            .or_insert(0) += 1;
        Ok(())
    }
}
