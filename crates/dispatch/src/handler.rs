use async_trait::async_trait;

use campushub_auth::RequestContext;
use campushub_core::DomainError;

use crate::request::Request;

/// Handles exactly one concrete request type.
///
/// The request context is passed explicitly on every invocation; handlers
/// never reach into ambient per-request state. Failures are domain errors and
/// propagate synchronously to the caller.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, request: R) -> Result<R::Response, DomainError>;
}
