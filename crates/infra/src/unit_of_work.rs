//! Tracked-entity store shared between request handlers and the event relay.
//!
//! Handlers mutate entities (appending events); the relay scans the tracked
//! set for non-empty buffers, publishes, clears, and commits. Per-entity
//! mutexes are the unit-of-work boundary: the relay never observes a
//! half-mutated entity because every mutation happens under the entity's own
//! lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use campushub_core::AggregateId;
use campushub_events::{DomainEvent, EventSource};

/// Shared handle to an event-capable entity.
pub type SharedEventSource = Arc<Mutex<dyn EventSource + Send>>;

/// Snapshot of one entity's pending events at scan time, in insertion order.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub aggregate_id: AggregateId,
    pub events: Vec<DomainEvent>,
}

#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    /// An entity or registry lock was poisoned by a panicking writer.
    #[error("unit of work lock poisoned")]
    Poisoned,
}

/// Contract between the relay and whatever tracks event-capable entities.
pub trait UnitOfWork: Send + Sync {
    /// Snapshot every tracked entity with a non-empty event buffer.
    fn scan_pending(&self) -> Result<Vec<PendingBatch>, UnitOfWorkError>;

    /// Clear the snapshotted events of the given batches. Only as many events
    /// as each batch captured are removed, so events appended to an entity
    /// after the scan stay buffered for the next cycle.
    fn clear_events(&self, batches: &[PendingBatch]) -> Result<(), UnitOfWorkError>;

    /// Commit the cleared state.
    fn commit(&self) -> Result<(), UnitOfWorkError>;
}

/// In-memory unit of work tracking live entity handles.
#[derive(Default)]
pub struct InMemoryUnitOfWork {
    tracked: Mutex<HashMap<AggregateId, SharedEventSource>>,
    commits: AtomicU64,
}

impl InMemoryUnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an entity. Tracking the same aggregate again replaces
    /// the handle (the latest handle is the live one).
    pub fn track(&self, aggregate_id: AggregateId, entity: SharedEventSource) {
        if let Ok(mut tracked) = self.tracked.lock() {
            tracked.insert(aggregate_id, entity);
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// Number of successful commits, for observability and tests.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

impl UnitOfWork for InMemoryUnitOfWork {
    fn scan_pending(&self) -> Result<Vec<PendingBatch>, UnitOfWorkError> {
        let tracked = self.tracked.lock().map_err(|_| UnitOfWorkError::Poisoned)?;

        let mut batches = Vec::new();
        for (aggregate_id, entity) in tracked.iter() {
            let entity = entity.lock().map_err(|_| UnitOfWorkError::Poisoned)?;
            let events = entity.events();
            if !events.is_empty() {
                batches.push(PendingBatch {
                    aggregate_id: *aggregate_id,
                    events: events.to_vec(),
                });
            }
        }

        Ok(batches)
    }

    fn clear_events(&self, batches: &[PendingBatch]) -> Result<(), UnitOfWorkError> {
        let tracked = self.tracked.lock().map_err(|_| UnitOfWorkError::Poisoned)?;

        for batch in batches {
            if let Some(entity) = tracked.get(&batch.aggregate_id) {
                let mut entity = entity.lock().map_err(|_| UnitOfWorkError::Poisoned)?;
                entity.clear_first_events(batch.events.len());
            }
        }

        Ok(())
    }

    fn commit(&self) -> Result<(), UnitOfWorkError> {
        // In-memory state is already live; commit only marks the cycle.
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl core::fmt::Debug for InMemoryUnitOfWork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryUnitOfWork")
            .field("tracked", &self.tracked_count())
            .field("commits", &self.commit_count())
            .finish()
    }
}
