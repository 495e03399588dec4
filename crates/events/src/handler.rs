use async_trait::async_trait;

use campushub_auth::RequestContext;

use crate::event::DomainEvent;

/// Side-effect subscriber for domain events.
///
/// Many handlers may be registered for the same event kind; they run
/// concurrently with no ordering guarantee between them. Delivery is
/// at-least-once (a cycle that fails after partial fan-out is retried), so
/// implementations must be idempotent.
///
/// Errors are opaque at this layer (`anyhow`); a failing handler fails the
/// whole publish for that event.
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Stable handler name, used in logs and error reports.
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &RequestContext, event: &DomainEvent) -> anyhow::Result<()>;
}
