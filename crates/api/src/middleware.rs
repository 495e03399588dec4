//! Context-resolution middleware.
//!
//! Runs once per inbound request, before any handler: validates an optional
//! bearer token, reads the tenant override header, resolves the
//! `RequestContext`, and stores it in request extensions. Routes take it from
//! there and pass it **explicitly** into every `send`/`publish` call.
//!
//! A missing token yields an anonymous context; only a present-but-invalid
//! token is rejected with 401.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use campushub_auth::{JwtValidator, TENANT_HEADER, TenantDirectory, resolve_context};

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub directory: Arc<dyn TenantDirectory>,
}

pub async fn context_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = match extract_bearer(req.headers()) {
        Some(token) => Some(
            state
                .jwt
                .validate(token, Utc::now())
                .map_err(|_e| StatusCode::UNAUTHORIZED)?,
        ),
        None => None,
    };

    let tenant_header = req
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok());

    let ctx = resolve_context(claims.as_ref(), tenant_header, state.directory.as_ref());
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}
