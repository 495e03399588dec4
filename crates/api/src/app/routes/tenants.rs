//! Tenant provisioning and lookup endpoints.

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use campushub_auth::{RequestContext, SubscriptionPlan};
use campushub_core::{DomainError, TenantId};

use crate::app::AppServices;
use crate::app::errors::{dispatch_error_response, domain_error_response, json_error};
use crate::app::handlers::{ActivateTenant, CreateTenant, GetTenant};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantBody {
    pub name: String,
    #[serde(default)]
    pub plan: Option<String>,
}

pub async fn create_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<CreateTenantBody>,
) -> Response {
    let plan = match body.plan.as_deref() {
        Some(raw) => match raw.parse::<SubscriptionPlan>() {
            Ok(plan) => plan,
            Err(message) => {
                return domain_error_response(DomainError::validation(message));
            }
        },
        None => SubscriptionPlan::default(),
    };

    match services
        .mediator
        .send(
            &ctx,
            CreateTenant {
                name: body.name,
                plan,
            },
        )
        .await
    {
        Ok(tenant_id) => (StatusCode::CREATED, Json(json!({ "tenantId": tenant_id }))).into_response(),
        Err(err) => dispatch_error_response(err),
    }
}

pub async fn activate_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(tenant_id): Path<Uuid>,
) -> Response {
    let tenant_id = TenantId::from(tenant_id);
    match services.mediator.send(&ctx, ActivateTenant { tenant_id }).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => dispatch_error_response(err),
    }
}

pub async fn get_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(tenant_id): Path<Uuid>,
) -> Response {
    let tenant_id = TenantId::from(tenant_id);
    match services.mediator.send(&ctx, GetTenant { tenant_id }).await {
        Ok(Some(summary)) => Json(summary).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "not_found", "tenant not found"),
        Err(err) => dispatch_error_response(err),
    }
}
