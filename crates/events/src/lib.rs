//! `campushub-events` — domain events and their fan-out pipeline.
//!
//! Events are immutable facts recorded by entities during business
//! operations; the [`EventPublisher`] fans each one out to every registered
//! subscriber concurrently.

pub mod event;
pub mod handler;
pub mod publisher;
pub mod source;

pub use event::{DomainEvent, EventPayload};
pub use handler::DomainEventHandler;
pub use publisher::{EventPublisher, EventPublisherBuilder, PublishError};
pub use source::{EventBuffer, EventSource};
