//! Background event relay.
//!
//! A single tokio task that wakes on an interval, scans the unit of work for
//! entities with pending events, publishes each event in insertion order, and
//! only then clears the buffers and commits. One cycle runs at a time.
//!
//! Delivery is **at-least-once**: if anything in a cycle fails, nothing is
//! cleared — including events that already published that cycle — and the
//! whole batch is retried after the error backoff. Subscribers must be
//! idempotent. Cycle errors never propagate to any request; they are only
//! visible in logs.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use campushub_auth::RequestContext;
use campushub_core::AggregateId;
use campushub_events::{EventPublisher, PublishError};

use crate::unit_of_work::{UnitOfWork, UnitOfWorkError};

/// Relay timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Sleep between healthy cycles.
    pub poll_interval: Duration,
    /// Sleep after a failed cycle.
    pub error_backoff: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            error_backoff: Duration::from_secs(30),
        }
    }
}

impl RelayConfig {
    /// Read overrides from `EVENT_RELAY_POLL_SECS` / `EVENT_RELAY_BACKOFF_SECS`,
    /// falling back to the defaults (5s / 30s).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: env_secs("EVENT_RELAY_POLL_SECS").unwrap_or(defaults.poll_interval),
            error_backoff: env_secs("EVENT_RELAY_BACKOFF_SECS").unwrap_or(defaults.error_backoff),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key).ok()?.parse::<u64>().ok().map(Duration::from_secs)
}

/// A single failed relay cycle. Non-fatal: the loop backs off and continues.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("scan/clear/commit failed: {0}")]
    UnitOfWork(#[from] UnitOfWorkError),

    #[error("publish failed for aggregate {aggregate_id}: {source}")]
    Publish {
        aggregate_id: AggregateId,
        #[source]
        source: PublishError,
    },
}

/// Handle to stop and join the relay task.
#[derive(Debug)]
pub struct RelayHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RelayHandle {
    /// Request graceful shutdown and wait for the relay to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Periodic scanner/publisher over a unit of work.
pub struct EventRelay<U> {
    unit_of_work: Arc<U>,
    publisher: Arc<EventPublisher>,
    config: RelayConfig,
}

impl<U> EventRelay<U>
where
    U: UnitOfWork + 'static,
{
    pub fn new(unit_of_work: Arc<U>, publisher: Arc<EventPublisher>, config: RelayConfig) -> Self {
        Self {
            unit_of_work,
            publisher,
            config,
        }
    }

    /// Spawn the relay loop on the current runtime.
    pub fn spawn(self) -> RelayHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        RelayHandle {
            shutdown: shutdown_tx,
            join,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            error_backoff_secs = self.config.error_backoff.as_secs(),
            "event relay started"
        );

        let mut sleep_for = self.config.poll_interval;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A closed channel means the handle is gone; stop too.
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(sleep_for) => {}
            }
            if *shutdown.borrow() {
                break;
            }

            sleep_for = match self.run_cycle().await {
                Ok(published) => {
                    if published > 0 {
                        debug!(published, "relay cycle delivered events");
                    }
                    self.config.poll_interval
                }
                Err(err) => {
                    error!(error = %err, "relay cycle failed; backing off");
                    self.config.error_backoff
                }
            };
        }

        info!("event relay stopped");
    }

    /// Execute one scan → publish → clear → commit cycle.
    ///
    /// Returns the number of events published. Exposed so wiring and tests
    /// can drive cycles without the timer loop.
    pub async fn run_cycle(&self) -> Result<usize, CycleError> {
        let batches = self.unit_of_work.scan_pending()?;
        if batches.is_empty() {
            return Ok(0);
        }

        let ctx = RequestContext::background();
        let mut published = 0usize;

        for batch in &batches {
            for event in &batch.events {
                self.publisher
                    .publish(&ctx, event)
                    .await
                    .map_err(|source| CycleError::Publish {
                        aggregate_id: batch.aggregate_id,
                        source,
                    })?;
                published += 1;
            }
        }

        // Clear and commit only after every publish in the cycle succeeded.
        // Only the snapshotted events are cleared; anything appended since
        // the scan stays buffered for the next cycle.
        self.unit_of_work.clear_events(&batches)?;
        self.unit_of_work.commit()?;

        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::time::Instant;

    use campushub_auth::SubscriptionPlan;
    use campushub_core::TenantId;
    use campushub_events::{DomainEvent, DomainEventHandler, EventSource};
    use campushub_tenancy::Tenant;

    use super::*;
    use crate::unit_of_work::{InMemoryUnitOfWork, PendingBatch};

    struct RecordingHandler {
        name: &'static str,
        seen: Mutex<Vec<&'static str>>,
    }

    impl RecordingHandler {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<&'static str> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DomainEventHandler for RecordingHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(&self, _ctx: &RequestContext, event: &DomainEvent) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(event.kind());
            Ok(())
        }
    }

    struct FlakyHandler {
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl FlakyHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                failing: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
            })
        }

        fn recover(&self) {
            self.failing.store(false, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DomainEventHandler for FlakyHandler {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn handle(&self, _ctx: &RequestContext, _event: &DomainEvent) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("transient downstream failure");
            }
            Ok(())
        }
    }

    fn tracked_tenant(uow: &InMemoryUnitOfWork) -> Arc<Mutex<Tenant>> {
        let tenant = Tenant::create(
            TenantId::new(),
            "Acme Academy",
            SubscriptionPlan::Free,
            Utc::now(),
        )
        .unwrap();
        let aggregate_id = tenant.aggregate_id();
        let handle = Arc::new(Mutex::new(tenant));
        uow.track(aggregate_id, handle.clone());
        handle
    }

    fn relay_with(
        uow: Arc<InMemoryUnitOfWork>,
        publisher: EventPublisher,
        config: RelayConfig,
    ) -> EventRelay<InMemoryUnitOfWork> {
        EventRelay::new(uow, Arc::new(publisher), config)
    }

    /// Scenario A: one entity accumulates two events; one cycle publishes both
    /// in insertion order with independent fan-outs, then the buffer is empty.
    #[tokio::test]
    async fn cycle_publishes_each_pending_event_then_clears() {
        let uow = Arc::new(InMemoryUnitOfWork::new());
        let tenant = tracked_tenant(&uow);
        tenant.lock().unwrap().activate(Utc::now()).unwrap();

        let created = RecordingHandler::new("created");
        let activated = RecordingHandler::new("activated");
        let publisher = EventPublisher::builder()
            .subscribe("tenant.created", created.clone())
            .subscribe("tenant.activated", activated.clone())
            .build();

        let relay = relay_with(uow.clone(), publisher, RelayConfig::default());
        let published = relay.run_cycle().await.unwrap();

        assert_eq!(published, 2);
        assert_eq!(created.seen(), vec!["tenant.created"]);
        assert_eq!(activated.seen(), vec!["tenant.activated"]);
        assert!(tenant.lock().unwrap().events().is_empty());
        assert_eq!(uow.commit_count(), 1);
    }

    #[tokio::test]
    async fn empty_scan_publishes_nothing_and_skips_commit() {
        let uow = Arc::new(InMemoryUnitOfWork::new());
        let tenant = tracked_tenant(&uow);
        tenant.lock().unwrap().clear_events();

        let relay = relay_with(
            uow.clone(),
            EventPublisher::builder().build(),
            RelayConfig::default(),
        );
        assert_eq!(relay.run_cycle().await.unwrap(), 0);
        assert_eq!(uow.commit_count(), 0);
    }

    /// Scenario D: one of three subscribers fails, the cycle fails, events
    /// stay buffered; after the subscriber recovers the next cycle delivers
    /// and clears. Pins at-least-once delivery.
    #[tokio::test]
    async fn failed_publish_leaves_events_buffered_for_retry() {
        let uow = Arc::new(InMemoryUnitOfWork::new());
        let tenant = tracked_tenant(&uow);

        let first = RecordingHandler::new("first");
        let second = RecordingHandler::new("second");
        let flaky = FlakyHandler::new();
        let publisher = EventPublisher::builder()
            .subscribe("tenant.created", first.clone())
            .subscribe("tenant.created", second.clone())
            .subscribe("tenant.created", flaky.clone())
            .build();

        let relay = relay_with(uow.clone(), publisher, RelayConfig::default());

        let err = relay.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Publish { .. }));
        assert_eq!(tenant.lock().unwrap().events().len(), 1);
        assert_eq!(uow.commit_count(), 0);

        flaky.recover();
        relay.run_cycle().await.unwrap();
        assert!(tenant.lock().unwrap().events().is_empty());
        assert_eq!(uow.commit_count(), 1);
        // At-least-once: recovered retry may re-deliver to healthy subscribers.
        assert!(!first.seen().is_empty());
        assert!(!second.seen().is_empty());
    }

    /// Reacts to `tenant.created` by mutating the tenant again, so a new
    /// event lands in the buffer while the cycle is mid-publish.
    struct ActivatingHandler {
        tenant: Arc<Mutex<Tenant>>,
    }

    #[async_trait]
    impl DomainEventHandler for ActivatingHandler {
        fn name(&self) -> &'static str {
            "activating"
        }

        async fn handle(&self, _ctx: &RequestContext, event: &DomainEvent) -> anyhow::Result<()> {
            if event.kind() == "tenant.created" {
                self.tenant.lock().unwrap().activate(Utc::now()).unwrap();
            }
            Ok(())
        }
    }

    /// An event appended between the cycle's scan and its clear is not lost:
    /// it stays buffered and the next cycle delivers it.
    #[tokio::test]
    async fn events_appended_mid_cycle_are_delivered_next_cycle() {
        let uow = Arc::new(InMemoryUnitOfWork::new());
        let tenant = tracked_tenant(&uow);

        let activated = RecordingHandler::new("activated");
        let publisher = EventPublisher::builder()
            .subscribe(
                "tenant.created",
                Arc::new(ActivatingHandler {
                    tenant: tenant.clone(),
                }),
            )
            .subscribe("tenant.activated", activated.clone())
            .build();

        let relay = relay_with(uow.clone(), publisher, RelayConfig::default());

        assert_eq!(relay.run_cycle().await.unwrap(), 1);
        assert!(activated.seen().is_empty());
        let kinds: Vec<_> = tenant
            .lock()
            .unwrap()
            .events()
            .iter()
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["tenant.activated"]);

        assert_eq!(relay.run_cycle().await.unwrap(), 1);
        assert_eq!(activated.seen(), vec!["tenant.activated"]);
        assert!(tenant.lock().unwrap().events().is_empty());
    }

    /// A publish failure on one entity aborts the whole cycle: even entities
    /// whose events already published keep their buffers.
    #[tokio::test]
    async fn failure_mid_cycle_leaves_all_buffers_untouched() {
        let uow = Arc::new(InMemoryUnitOfWork::new());
        let first = tracked_tenant(&uow);
        let second = tracked_tenant(&uow);

        let flaky = FlakyHandler::new();
        let publisher = EventPublisher::builder()
            .subscribe("tenant.created", flaky.clone())
            .build();

        let relay = relay_with(uow.clone(), publisher, RelayConfig::default());
        relay.run_cycle().await.unwrap_err();

        assert_eq!(first.lock().unwrap().events().len(), 1);
        assert_eq!(second.lock().unwrap().events().len(), 1);
    }

    /// Instrumented unit of work recording the (virtual) time of every scan.
    struct ProbeUnitOfWork {
        scans: Mutex<Vec<Instant>>,
        fail: AtomicBool,
    }

    impl ProbeUnitOfWork {
        fn new(fail: bool) -> Self {
            Self {
                scans: Mutex::new(Vec::new()),
                fail: AtomicBool::new(fail),
            }
        }

        fn scan_times(&self) -> Vec<Instant> {
            self.scans.lock().unwrap().clone()
        }
    }

    impl UnitOfWork for ProbeUnitOfWork {
        fn scan_pending(&self) -> Result<Vec<PendingBatch>, UnitOfWorkError> {
            self.scans.lock().unwrap().push(Instant::now());
            if self.fail.load(Ordering::SeqCst) {
                Err(UnitOfWorkError::Poisoned)
            } else {
                Ok(Vec::new())
            }
        }

        fn clear_events(&self, _batches: &[PendingBatch]) -> Result<(), UnitOfWorkError> {
            Ok(())
        }

        fn commit(&self) -> Result<(), UnitOfWorkError> {
            Ok(())
        }
    }

    async fn wait_for_scans(uow: &ProbeUnitOfWork, count: usize) {
        while uow.scan_times().len() < count {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_cycles_are_spaced_by_the_poll_interval() {
        let uow = Arc::new(ProbeUnitOfWork::new(false));
        let config = RelayConfig::default();
        let relay = EventRelay::new(uow.clone(), Arc::new(EventPublisher::builder().build()), config);
        let handle = relay.spawn();

        wait_for_scans(&uow, 3).await;
        handle.shutdown().await;

        let times = uow.scan_times();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= config.poll_interval);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycles_back_off_before_the_next_scan() {
        let uow = Arc::new(ProbeUnitOfWork::new(true));
        let config = RelayConfig::default();
        let relay = EventRelay::new(uow.clone(), Arc::new(EventPublisher::builder().build()), config);
        let handle = relay.spawn();

        wait_for_scans(&uow, 3).await;
        handle.shutdown().await;

        let times = uow.scan_times();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= config.error_backoff);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop_during_a_sleep() {
        let uow = Arc::new(ProbeUnitOfWork::new(false));
        let relay = EventRelay::new(
            uow.clone(),
            Arc::new(EventPublisher::builder().build()),
            RelayConfig::default(),
        );
        let handle = relay.spawn();

        wait_for_scans(&uow, 1).await;
        // Returns promptly even though the loop is mid-sleep.
        handle.shutdown().await;
    }

    #[test]
    fn config_defaults_match_the_contract() {
        let config = RelayConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.error_backoff, Duration::from_secs(30));
    }
}
