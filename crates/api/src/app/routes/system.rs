//! Liveness and caller-introspection endpoints.

use axum::Extension;
use axum::Json;
use serde_json::{Value, json};

use campushub_auth::RequestContext;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Echo the resolved request context: who the caller is and which tenant the
/// request is scoped to. Useful for debugging tenant-header precedence.
pub async fn me(Extension(ctx): Extension<RequestContext>) -> Json<Value> {
    let tenant = ctx.tenant().map(|t| {
        json!({
            "tenantId": t.tenant_id(),
            "name": t.tenant_name(),
            "isActive": t.is_active(),
            "plan": t.subscription_plan(),
        })
    });

    Json(json!({
        "isAuthenticated": ctx.user().is_authenticated(),
        "userId": ctx.user().user_id(),
        "email": ctx.user().email(),
        "tenant": tenant,
    }))
}
