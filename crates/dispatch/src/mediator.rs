//! Dispatch registry: concrete request type → single handler.
//!
//! The registry is an explicit `TypeId` map populated at startup. Exactly one
//! handler per request type is an invariant: a second registration for the
//! same type fails the build eagerly, and dispatching an unregistered type
//! fails with `HandlerNotFound`. There is no retry, timeout, or queueing at
//! this layer — a single awaited call from caller to handler and back.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use campushub_auth::RequestContext;
use campushub_core::DomainError;

use crate::handler::RequestHandler;
use crate::request::{Command, Query, Request};

/// Startup-time registry configuration error. Fatal: the process should not
/// come up with an ambiguous route.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("handler already registered for request type '{request_type}'")]
    AmbiguousHandler { request_type: &'static str },
}

/// Dispatch-time error, surfaced synchronously to the caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for request type '{request_type}'")]
    HandlerNotFound { request_type: &'static str },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

struct RegisteredHandler {
    request_type: &'static str,
    /// Holds an `Arc<dyn RequestHandler<R>>`, keyed by `TypeId::of::<R>()`.
    handler: Box<dyn Any + Send + Sync>,
}

/// Builds the dispatch registry once at startup.
#[derive(Default)]
pub struct MediatorBuilder {
    handlers: HashMap<TypeId, RegisteredHandler>,
}

impl MediatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command<C, H>(self, handler: H) -> Result<Self, RegistryError>
    where
        C: Command,
        H: RequestHandler<C> + 'static,
    {
        self.register::<C, H>(handler)
    }

    pub fn register_query<Q, H>(self, handler: H) -> Result<Self, RegistryError>
    where
        Q: Query,
        H: RequestHandler<Q> + 'static,
    {
        self.register::<Q, H>(handler)
    }

    fn register<R, H>(mut self, handler: H) -> Result<Self, RegistryError>
    where
        R: Request,
        H: RequestHandler<R> + 'static,
    {
        let request_type = type_name::<R>();
        let erased: Arc<dyn RequestHandler<R>> = Arc::new(handler);

        if self
            .handlers
            .insert(
                TypeId::of::<R>(),
                RegisteredHandler {
                    request_type,
                    handler: Box::new(erased),
                },
            )
            .is_some()
        {
            return Err(RegistryError::AmbiguousHandler { request_type });
        }

        Ok(self)
    }

    pub fn build(self) -> Mediator {
        Mediator {
            handlers: Arc::new(self.handlers),
        }
    }
}

impl core::fmt::Debug for MediatorBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MediatorBuilder")
            .field(
                "request_types",
                &self
                    .handlers
                    .values()
                    .map(|h| h.request_type)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Routes a request value to its single registered handler.
#[derive(Clone)]
pub struct Mediator {
    handlers: Arc<HashMap<TypeId, RegisteredHandler>>,
}

impl Mediator {
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::new()
    }

    /// Dispatch a request to its handler and await the typed result.
    pub async fn send<R: Request>(
        &self,
        ctx: &RequestContext,
        request: R,
    ) -> Result<R::Response, DispatchError> {
        let entry = self.handlers.get(&TypeId::of::<R>()).ok_or_else(|| {
            DispatchError::HandlerNotFound {
                request_type: type_name::<R>(),
            }
        })?;

        debug!(request_type = entry.request_type, "dispatching request");

        let handler = entry
            .handler
            .downcast_ref::<Arc<dyn RequestHandler<R>>>()
            .unwrap_or_else(|| {
                // The TypeId key pins the stored handler type at registration.
                unreachable!("registry entry type mismatch for {}", entry.request_type)
            });

        Ok(handler.handle(ctx, request).await?)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl core::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mediator")
            .field(
                "request_types",
                &self
                    .handlers
                    .values()
                    .map(|h| h.request_type)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
