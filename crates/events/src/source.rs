//! Event-capable entity contract.
//!
//! Any entity can gain event buffering by embedding an [`EventBuffer`] and
//! delegating this trait to it — a small composable capability instead of a
//! mandatory base type.

use crate::event::DomainEvent;

/// Read-only access to an entity's pending domain events plus the ability to
/// clear them after delivery.
///
/// Invariants:
/// - `events()` returns the pending events in insertion order.
/// - The buffer only grows while the entity is mutated inside a unit of work.
/// - `clear_events()` is idempotent: clearing an empty buffer is a no-op.
///   Once cleared, prior events are unrecoverable from the entity.
pub trait EventSource {
    fn events(&self) -> &[DomainEvent];

    fn clear_events(&mut self);

    /// Remove only the first `count` pending events. Events appended after a
    /// snapshot was taken stay buffered for the next delivery pass.
    fn clear_first_events(&mut self, count: usize);
}

/// Append-only buffer of pending events, for embedding into entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBuffer {
    events: Vec<DomainEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new event. Entities call this as a consequence of their own
    /// state transitions, never as an independent action.
    pub fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Remove the first `count` events; a `count` past the end clears all.
    pub fn clear_first(&mut self, count: usize) {
        let count = count.min(self.events.len());
        self.events.drain(..count);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
