//! Per-request context resolution.
//!
//! Resolution order for the tenant (highest wins):
//! 1. `X-Tenant-Id` header, when syntactically valid and resolvable to an
//!    **active** tenant;
//! 2. tenant claim on the authenticated principal;
//! 3. no tenant.
//!
//! An authenticated user without a resolvable tenant is not an error: the
//! request proceeds with no tenant context and a warning is logged. Handlers
//! must treat the nil tenant as "no tenant-scoped behavior applies".

use core::str::FromStr;

use tracing::warn;

use campushub_core::TenantId;

use crate::claims::JwtClaims;
use crate::context::{RequestContext, TenantContext, UserContext};

/// Header carrying an explicit tenant override.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Looks up tenant context by id.
///
/// Returns the tenant whether or not it is active; callers decide how
/// `is_active` affects precedence.
pub trait TenantDirectory: Send + Sync {
    fn find(&self, tenant_id: TenantId) -> Option<TenantContext>;
}

/// Resolve the request context from verified claims and the tenant header.
pub fn resolve_context(
    claims: Option<&JwtClaims>,
    tenant_header: Option<&str>,
    directory: &dyn TenantDirectory,
) -> RequestContext {
    let user = match claims {
        Some(c) => UserContext::authenticated(c.sub, &c.email, &c.name, c.roles.iter().cloned()),
        None => UserContext::anonymous(),
    };

    let tenant = resolve_tenant(claims, tenant_header, directory);

    if user.is_authenticated() && tenant.is_none() {
        warn!(
            user_id = %user.user_id().map(|id| id.to_string()).unwrap_or_default(),
            "authenticated user has no resolvable tenant; proceeding without tenant context"
        );
    }

    RequestContext::new(user, tenant)
}

fn resolve_tenant(
    claims: Option<&JwtClaims>,
    tenant_header: Option<&str>,
    directory: &dyn TenantDirectory,
) -> Option<TenantContext> {
    if let Some(raw) = tenant_header {
        match TenantId::from_str(raw.trim()) {
            Ok(tenant_id) => match directory.find(tenant_id) {
                Some(tenant) if tenant.is_active() => return Some(tenant),
                Some(_) => {
                    warn!(%tenant_id, "tenant override header names an inactive tenant; ignoring");
                }
                None => {
                    warn!(%tenant_id, "tenant override header names an unknown tenant; ignoring");
                }
            },
            Err(_) => {
                warn!(header = raw, "malformed tenant override header; ignoring");
            }
        }
    }

    claims
        .and_then(|c| c.tenant_id)
        .and_then(|tenant_id| directory.find(tenant_id))
}
