//! `campushub-tenancy` — tenant lifecycle domain.

pub mod tenant;

pub use tenant::{Tenant, TenantStatus};
