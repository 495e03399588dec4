//! `campushub-dispatch` — CQRS mediator.
//!
//! Maps each concrete command/query type to exactly one handler through a
//! registry built once at startup. Misconfiguration (duplicate registration)
//! is an eager build-time error, not a first-dispatch surprise.

pub mod handler;
pub mod mediator;
pub mod request;

pub use handler::RequestHandler;
pub use mediator::{DispatchError, Mediator, MediatorBuilder, RegistryError};
pub use request::{Command, Query, Request};
