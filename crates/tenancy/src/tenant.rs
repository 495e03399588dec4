use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campushub_auth::SubscriptionPlan;
use campushub_core::{AggregateId, DomainError, DomainResult, Entity, TenantId};
use campushub_events::{DomainEvent, EventBuffer, EventPayload, EventSource};

/// Tenant lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Pending,
    Active,
    Suspended,
}

/// A tenant: an isolated customer/organization under which requests and data
/// are scoped.
///
/// State changes record domain events into the embedded buffer; the buffer is
/// drained asynchronously by the event relay.
#[derive(Debug, Clone)]
pub struct Tenant {
    id: TenantId,
    name: String,
    plan: SubscriptionPlan,
    status: TenantStatus,
    settings: HashMap<String, String>,
    created_at: DateTime<Utc>,
    events: EventBuffer,
}

impl Tenant {
    /// Create a new (pending) tenant. Records `tenant.created`.
    pub fn create(
        id: TenantId,
        name: impl Into<String>,
        plan: SubscriptionPlan,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("tenant name must not be empty"));
        }

        let mut tenant = Self {
            id,
            name: name.clone(),
            plan,
            status: TenantStatus::Pending,
            settings: HashMap::new(),
            created_at: now,
            events: EventBuffer::new(),
        };

        tenant.record(
            now,
            EventPayload::TenantCreated {
                name,
                plan: plan.to_string(),
            },
        );

        Ok(tenant)
    }

    /// Activate a pending or suspended tenant. Records `tenant.activated`.
    pub fn activate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            TenantStatus::Pending | TenantStatus::Suspended => {
                self.status = TenantStatus::Active;
                self.record(now, EventPayload::TenantActivated);
                Ok(())
            }
            TenantStatus::Active => Err(DomainError::conflict("tenant is already active")),
        }
    }

    /// Suspend an active tenant. Records `tenant.deactivated`.
    pub fn deactivate(&mut self, reason: Option<String>, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            TenantStatus::Active => {
                self.status = TenantStatus::Suspended;
                self.record(now, EventPayload::TenantDeactivated { reason });
                Ok(())
            }
            _ => Err(DomainError::conflict("tenant is not active")),
        }
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn tenant_id(&self) -> TenantId {
        self.id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        AggregateId::from(self.id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan(&self) -> SubscriptionPlan {
        self.plan
    }

    pub fn status(&self) -> TenantStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn record(&mut self, now: DateTime<Utc>, payload: EventPayload) {
        self.events
            .record(DomainEvent::new(self.aggregate_id(), "tenant", now, payload));
    }
}

impl Entity for Tenant {
    type Id = TenantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl EventSource for Tenant {
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
