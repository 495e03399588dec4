//! `campushub-infra` — in-memory infrastructure: unit of work, the background
//! event relay, entity stores, and side-effect subscribers.

pub mod relay;
pub mod store;
pub mod subscribers;
pub mod unit_of_work;

pub use relay::{CycleError, EventRelay, RelayConfig, RelayHandle};
pub use store::InMemoryStore;
pub use subscribers::{
    AuditEntry, AuditTrailSubscriber, EnrollmentCounterSubscriber, WelcomeNotificationSubscriber,
};
pub use unit_of_work::{InMemoryUnitOfWork, PendingBatch, UnitOfWork, UnitOfWorkError};
