//! Dispatch/domain error to HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use campushub_core::DomainError;
use campushub_dispatch::DispatchError;

/// Build a JSON error body with a stable machine-readable code.
pub fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
    let body = Json(json!({
        "error": {
            "code": code,
            "message": message,
        }
    }));
    (status, body).into_response()
}

/// Map a dispatch failure onto an HTTP response.
///
/// `HandlerNotFound` is a wiring bug, not a caller mistake, so it surfaces as
/// a 500 rather than a 4xx.
pub fn dispatch_error_response(err: DispatchError) -> Response {
    match err {
        DispatchError::HandlerNotFound { request_type } => {
            tracing::error!(request_type, "no handler registered for request");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "handler_not_found",
                "no handler is registered for this request",
            )
        }
        DispatchError::Domain(domain) => domain_error_response(domain),
    }
}

pub fn domain_error_response(err: DomainError) -> Response {
    let message = err.to_string();
    let (status, code) = match err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => {
            (StatusCode::BAD_REQUEST, "validation_failed")
        }
        DomainError::TenantRequired => (StatusCode::BAD_REQUEST, "tenant_required"),
        DomainError::Unauthorized => (StatusCode::FORBIDDEN, "unauthorized"),
        DomainError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        DomainError::InvariantViolation(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invariant_violated")
        }
    };
    json_error(status, code, &message)
}
