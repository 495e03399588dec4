//! Course lifecycle and enrollment endpoints. All tenant-scoped.

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use campushub_auth::RequestContext;
use campushub_core::AggregateId;
use campushub_courses::CourseId;

use crate::app::AppServices;
use crate::app::errors::{dispatch_error_response, json_error};
use crate::app::handlers::{CreateCourse, EnrollStudent, GetCourse, PublishCourse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseBody {
    pub title: String,
}

pub async fn create_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<CreateCourseBody>,
) -> Response {
    match services
        .mediator
        .send(&ctx, CreateCourse { title: body.title })
        .await
    {
        Ok(course_id) => (StatusCode::CREATED, Json(json!({ "courseId": course_id }))).into_response(),
        Err(err) => dispatch_error_response(err),
    }
}

pub async fn publish_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(course_id): Path<Uuid>,
) -> Response {
    let course_id = CourseId::new(AggregateId::from(course_id));
    match services.mediator.send(&ctx, PublishCourse { course_id }).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => dispatch_error_response(err),
    }
}

pub async fn enroll_student(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(course_id): Path<Uuid>,
) -> Response {
    let course_id = CourseId::new(AggregateId::from(course_id));
    match services.mediator.send(&ctx, EnrollStudent { course_id }).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => dispatch_error_response(err),
    }
}

pub async fn get_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(course_id): Path<Uuid>,
) -> Response {
    let course_id = CourseId::new(AggregateId::from(course_id));
    match services.mediator.send(&ctx, GetCourse { course_id }).await {
        Ok(Some(summary)) => Json(summary).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "not_found", "course not found"),
        Err(err) => dispatch_error_response(err),
    }
}
