//! `campushub-auth` — identity, tenancy context, and claim validation.
//!
//! This crate is intentionally decoupled from HTTP and storage. Contexts are
//! plain values resolved once per request and threaded explicitly through
//! dispatch and publish calls.

pub mod claims;
pub mod context;
pub mod jwt;
pub mod resolver;
pub mod roles;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use context::{RequestContext, SubscriptionPlan, TenantContext, UserContext};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use resolver::{TENANT_HEADER, TenantDirectory, resolve_context};
pub use roles::Role;
