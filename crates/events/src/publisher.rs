//! Event fan-out publisher.
//!
//! The publisher maps an event kind to the set of subscribers registered for
//! it, invokes all of them **concurrently**, and awaits the whole batch. It
//! holds no state of its own; failure of any subscriber fails the publish
//! (no partial-success bookkeeping — retry happens upstream, at the relay).

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use thiserror::Error;
use tracing::debug;

use campushub_auth::RequestContext;

use crate::event::DomainEvent;
use crate::handler::DomainEventHandler;

#[derive(Debug, Error)]
pub enum PublishError {
    /// A subscriber failed during fan-out; the batch for this event failed.
    #[error("event handler '{handler}' failed for '{event_kind}': {source}")]
    HandlerFailed {
        event_kind: &'static str,
        handler: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Fans a single domain event out to all subscribers registered for its kind.
pub struct EventPublisher {
    handlers: HashMap<&'static str, Vec<Arc<dyn DomainEventHandler>>>,
}

impl EventPublisher {
    pub fn builder() -> EventPublisherBuilder {
        EventPublisherBuilder::default()
    }

    /// Number of subscribers registered for an event kind.
    pub fn handler_count(&self, kind: &str) -> usize {
        self.handlers.get(kind).map_or(0, Vec::len)
    }

    /// Publish one event to all of its subscribers, concurrently.
    ///
    /// Completes only once every subscriber has completed, or fails as soon
    /// as one subscriber fails. Zero subscribers is not an error.
    pub async fn publish(
        &self,
        ctx: &RequestContext,
        event: &DomainEvent,
    ) -> Result<(), PublishError> {
        let kind = event.kind();
        let Some(handlers) = self.handlers.get(kind) else {
            debug!(event_kind = kind, "no subscribers registered; skipping");
            return Ok(());
        };

        let fan_out = handlers.iter().map(|handler| {
            let handler = Arc::clone(handler);
            async move {
                handler
                    .handle(ctx, event)
                    .await
                    .map_err(|source| PublishError::HandlerFailed {
                        event_kind: kind,
                        handler: handler.name(),
                        source,
                    })
            }
        });

        try_join_all(fan_out).await?;
        Ok(())
    }
}

impl core::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder collecting subscriber registrations at startup.
#[derive(Default)]
pub struct EventPublisherBuilder {
    handlers: HashMap<&'static str, Vec<Arc<dyn DomainEventHandler>>>,
}

impl EventPublisherBuilder {
    /// Register a subscriber for an event kind. Unlike command handlers,
    /// fan-out is many subscribers per kind, so duplicates are allowed.
    pub fn subscribe(mut self, kind: &'static str, handler: Arc<dyn DomainEventHandler>) -> Self {
        self.handlers.entry(kind).or_default().push(handler);
        self
    }

    pub fn build(self) -> EventPublisher {
        EventPublisher {
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Barrier;

    use campushub_core::AggregateId;

    use super::*;
    use crate::event::EventPayload;

    fn tenant_created() -> DomainEvent {
        DomainEvent::new(
            AggregateId::new(),
            "tenant",
            Utc::now(),
            EventPayload::TenantCreated {
                name: "Acme Academy".to_string(),
                plan: "free".to_string(),
            },
        )
    }

    struct CountingHandler {
        name: &'static str,
        calls: AtomicUsize,
    }

    impl CountingHandler {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DomainEventHandler for CountingHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(&self, _ctx: &RequestContext, _event: &DomainEvent) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl DomainEventHandler for FailingHandler {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _ctx: &RequestContext, _event: &DomainEvent) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    /// Completes only if both registered handlers are in flight at the same
    /// time; proves fan-out is concurrent rather than sequential.
    struct BarrierHandler {
        barrier: Arc<Barrier>,
    }

    #[async_trait]
    impl DomainEventHandler for BarrierHandler {
        fn name(&self) -> &'static str {
            "barrier"
        }

        async fn handle(&self, _ctx: &RequestContext, _event: &DomainEvent) -> anyhow::Result<()> {
            self.barrier.wait().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_invokes_every_registered_handler() {
        let first = CountingHandler::new("first");
        let second = CountingHandler::new("second");
        let third = CountingHandler::new("third");
        let publisher = EventPublisher::builder()
            .subscribe("tenant.created", first.clone())
            .subscribe("tenant.created", second.clone())
            .subscribe("tenant.created", third.clone())
            .build();

        let ctx = RequestContext::background();
        publisher.publish(&ctx, &tenant_created()).await.unwrap();

        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 1);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_ok() {
        let publisher = EventPublisher::builder().build();
        let ctx = RequestContext::background();
        assert!(publisher.publish(&ctx, &tenant_created()).await.is_ok());
    }

    #[tokio::test]
    async fn one_failing_handler_fails_the_batch() {
        let ok = CountingHandler::new("ok");
        let publisher = EventPublisher::builder()
            .subscribe("tenant.created", ok.clone())
            .subscribe("tenant.created", Arc::new(FailingHandler))
            .build();

        let ctx = RequestContext::background();
        let err = publisher.publish(&ctx, &tenant_created()).await.unwrap_err();
        match err {
            PublishError::HandlerFailed {
                event_kind,
                handler,
                ..
            } => {
                assert_eq!(event_kind, "tenant.created");
                assert_eq!(handler, "failing");
            }
        }
    }

    #[tokio::test]
    async fn handlers_for_one_event_run_concurrently() {
        let barrier = Arc::new(Barrier::new(2));
        let publisher = EventPublisher::builder()
            .subscribe(
                "tenant.created",
                Arc::new(BarrierHandler {
                    barrier: barrier.clone(),
                }),
            )
            .subscribe(
                "tenant.created",
                Arc::new(BarrierHandler { barrier }),
            )
            .build();

        let ctx = RequestContext::background();
        // Would deadlock (and hit the timeout) if handlers ran sequentially.
        tokio::time::timeout(
            Duration::from_secs(5),
            publisher.publish(&ctx, &tenant_created()),
        )
        .await
        .expect("fan-out was not concurrent")
        .unwrap();
    }

    #[tokio::test]
    async fn subscribers_are_scoped_to_their_event_kind() {
        let tenant_handler = CountingHandler::new("tenant");
        let course_handler = CountingHandler::new("course");
        let publisher = EventPublisher::builder()
            .subscribe("tenant.created", tenant_handler.clone())
            .subscribe("course.created", course_handler.clone())
            .build();

        let ctx = RequestContext::background();
        publisher.publish(&ctx, &tenant_created()).await.unwrap();

        assert_eq!(tenant_handler.calls(), 1);
        assert_eq!(course_handler.calls(), 0);
    }
}
