//! Route handlers, grouped by surface.

pub mod courses;
pub mod system;
pub mod tenants;
