//! Request-scoped identity and tenant context.
//!
//! Contexts are resolved once per inbound request and passed **explicitly**
//! into dispatch and publish calls. There is no ambient/global state: each
//! concurrent request owns its own `RequestContext`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use campushub_core::{TenantId, UserId};

use crate::Role;

/// Subscription plan a tenant is on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Free,
    Standard,
    Premium,
}

impl Default for SubscriptionPlan {
    fn default() -> Self {
        Self::Free
    }
}

impl core::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Standard => "standard",
            SubscriptionPlan::Premium => "premium",
        };
        f.write_str(s)
    }
}

impl core::str::FromStr for SubscriptionPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            other => Err(format!("unknown subscription plan: {other}")),
        }
    }
}

/// Identity context for a request.
///
/// `user_id` is absent for unauthenticated requests; `is_authenticated` is
/// derived from its presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: Option<UserId>,
    email: Option<String>,
    display_name: Option<String>,
    roles: HashSet<Role>,
}

impl UserContext {
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            email: None,
            display_name: None,
            roles: HashSet::new(),
        }
    }

    pub fn authenticated(
        user_id: UserId,
        email: impl Into<String>,
        display_name: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            user_id: Some(user_id),
            email: Some(email.into()),
            display_name: Some(display_name.into()),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn roles(&self) -> &HashSet<Role> {
        &self.roles
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn is_in_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

/// Tenant context for a request.
///
/// Immutable for the request's duration. Absence of a tenant is modelled as
/// `Option<TenantContext>` on [`RequestContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    tenant_name: String,
    is_active: bool,
    subscription_plan: SubscriptionPlan,
    settings: HashMap<String, String>,
}

impl TenantContext {
    pub fn new(
        tenant_id: TenantId,
        tenant_name: impl Into<String>,
        is_active: bool,
        subscription_plan: SubscriptionPlan,
        settings: HashMap<String, String>,
    ) -> Self {
        Self {
            tenant_id,
            tenant_name: tenant_name.into(),
            is_active,
            subscription_plan,
            settings,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn tenant_name(&self) -> &str {
        &self.tenant_name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn subscription_plan(&self) -> SubscriptionPlan {
        self.subscription_plan
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// The full per-request ambient state, made explicit.
///
/// Handlers receive this as a parameter on every `send`/`publish` call; no
/// framework-specific request-item bag is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    user: UserContext,
    tenant: Option<TenantContext>,
}

impl RequestContext {
    pub fn new(user: UserContext, tenant: Option<TenantContext>) -> Self {
        Self { user, tenant }
    }

    /// Context for an unauthenticated request with no tenant.
    pub fn anonymous() -> Self {
        Self::new(UserContext::anonymous(), None)
    }

    /// Context used by background work (no request, no tenant).
    pub fn background() -> Self {
        Self::anonymous()
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    pub fn tenant(&self) -> Option<&TenantContext> {
        self.tenant.as_ref()
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant.as_ref().map(TenantContext::tenant_id)
    }
}
