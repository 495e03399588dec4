//! Application command/query handlers.
//!
//! Handlers load entities from the in-memory stores, run domain operations
//! (which record events), and track mutated entities with the unit of work so
//! the event relay can pick their events up. Tenant-scoped operations reject
//! a nil tenant context.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use campushub_auth::{RequestContext, SubscriptionPlan};
use campushub_core::{DomainError, TenantId, UserId};
use campushub_courses::{Course, CourseId, CourseStatus};
use campushub_dispatch::{Command, Query, Request, RequestHandler};
use campushub_events::EventSource;
use campushub_infra::{InMemoryStore, InMemoryUnitOfWork};
use campushub_tenancy::{Tenant, TenantStatus};

pub type TenantStore = InMemoryStore<TenantId, Tenant>;
pub type CourseStore = InMemoryStore<CourseId, Course>;

fn lock<'a, T>(entity: &'a Arc<Mutex<T>>) -> Result<std::sync::MutexGuard<'a, T>, DomainError> {
    entity
        .lock()
        .map_err(|_| DomainError::invariant("entity state lock poisoned"))
}

// ---------------------------------------------------------------------------
// Tenancy
// ---------------------------------------------------------------------------

/// Provision a new (pending) tenant.
#[derive(Debug, Clone)]
pub struct CreateTenant {
    pub name: String,
    pub plan: SubscriptionPlan,
}

impl Request for CreateTenant {
    type Response = TenantId;
}

impl Command for CreateTenant {}

pub struct CreateTenantHandler {
    pub tenants: Arc<TenantStore>,
    pub unit_of_work: Arc<InMemoryUnitOfWork>,
}

#[async_trait]
impl RequestHandler<CreateTenant> for CreateTenantHandler {
    async fn handle(&self, _ctx: &RequestContext, cmd: CreateTenant) -> Result<TenantId, DomainError> {
        let tenant_id = TenantId::new();
        let tenant = Tenant::create(tenant_id, cmd.name, cmd.plan, Utc::now())?;
        let aggregate_id = tenant.aggregate_id();

        let handle = self.tenants.insert(tenant_id, tenant);
        self.unit_of_work.track(aggregate_id, handle);

        Ok(tenant_id)
    }
}

/// Activate a pending or suspended tenant.
#[derive(Debug, Clone, Copy)]
pub struct ActivateTenant {
    pub tenant_id: TenantId,
}

impl Request for ActivateTenant {
    type Response = ();
}

impl Command for ActivateTenant {}

pub struct ActivateTenantHandler {
    pub tenants: Arc<TenantStore>,
}

#[async_trait]
impl RequestHandler<ActivateTenant> for ActivateTenantHandler {
    async fn handle(&self, _ctx: &RequestContext, cmd: ActivateTenant) -> Result<(), DomainError> {
        let tenant = self
            .tenants
            .get(&cmd.tenant_id)
            .ok_or(DomainError::NotFound)?;
        lock(&tenant)?.activate(Utc::now())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
    pub tenant_id: TenantId,
    pub name: String,
    pub plan: SubscriptionPlan,
    pub status: TenantStatus,
    pub pending_events: usize,
}

/// Look up a tenant by id.
#[derive(Debug, Clone, Copy)]
pub struct GetTenant {
    pub tenant_id: TenantId,
}

impl Request for GetTenant {
    type Response = Option<TenantSummary>;
}

impl Query for GetTenant {}

pub struct GetTenantHandler {
    pub tenants: Arc<TenantStore>,
}

#[async_trait]
impl RequestHandler<GetTenant> for GetTenantHandler {
    async fn handle(
        &self,
        _ctx: &RequestContext,
        query: GetTenant,
    ) -> Result<Option<TenantSummary>, DomainError> {
        let Some(tenant) = self.tenants.get(&query.tenant_id) else {
            return Ok(None);
        };
        let tenant = lock(&tenant)?;
        Ok(Some(TenantSummary {
            tenant_id: tenant.tenant_id(),
            name: tenant.name().to_string(),
            plan: tenant.plan(),
            status: tenant.status(),
            pending_events: tenant.events().len(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

/// Create a draft course in the caller's tenant.
#[derive(Debug, Clone)]
pub struct CreateCourse {
    pub title: String,
}

impl Request for CreateCourse {
    type Response = CourseId;
}

impl Command for CreateCourse {}

pub struct CreateCourseHandler {
    pub courses: Arc<CourseStore>,
    pub unit_of_work: Arc<InMemoryUnitOfWork>,
}

#[async_trait]
impl RequestHandler<CreateCourse> for CreateCourseHandler {
    async fn handle(&self, ctx: &RequestContext, cmd: CreateCourse) -> Result<CourseId, DomainError> {
        let tenant_id = ctx.tenant_id().ok_or(DomainError::TenantRequired)?;

        let course_id = CourseId::new(campushub_core::AggregateId::new());
        let course = Course::create(course_id, tenant_id, cmd.title, Utc::now())?;
        let aggregate_id = course.aggregate_id();

        let handle = self.courses.insert(course_id, course);
        self.unit_of_work.track(aggregate_id, handle);

        Ok(course_id)
    }
}

/// Publish a draft course.
#[derive(Debug, Clone, Copy)]
pub struct PublishCourse {
    pub course_id: CourseId,
}

impl Request for PublishCourse {
    type Response = ();
}

impl Command for PublishCourse {}

pub struct PublishCourseHandler {
    pub courses: Arc<CourseStore>,
}

#[async_trait]
impl RequestHandler<PublishCourse> for PublishCourseHandler {
    async fn handle(&self, ctx: &RequestContext, cmd: PublishCourse) -> Result<(), DomainError> {
        let tenant_id = ctx.tenant_id().ok_or(DomainError::TenantRequired)?;

        let course = self
            .courses
            .get(&cmd.course_id)
            .ok_or(DomainError::NotFound)?;
        let mut course = lock(&course)?;
        // Cross-tenant access reads as "not found" rather than leaking existence.
        if course.tenant_id() != tenant_id {
            return Err(DomainError::NotFound);
        }
        course.publish(Utc::now())
    }
}

/// Enroll the calling user into a published course.
#[derive(Debug, Clone, Copy)]
pub struct EnrollStudent {
    pub course_id: CourseId,
}

impl Request for EnrollStudent {
    type Response = ();
}

impl Command for EnrollStudent {}

pub struct EnrollStudentHandler {
    pub courses: Arc<CourseStore>,
}

#[async_trait]
impl RequestHandler<EnrollStudent> for EnrollStudentHandler {
    async fn handle(&self, ctx: &RequestContext, cmd: EnrollStudent) -> Result<(), DomainError> {
        let student_id: UserId = ctx.user().user_id().ok_or(DomainError::Unauthorized)?;
        let tenant_id = ctx.tenant_id().ok_or(DomainError::TenantRequired)?;

        let course = self
            .courses
            .get(&cmd.course_id)
            .ok_or(DomainError::NotFound)?;
        let mut course = lock(&course)?;
        if course.tenant_id() != tenant_id {
            return Err(DomainError::NotFound);
        }
        course.enroll(student_id, Utc::now())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub course_id: CourseId,
    pub title: String,
    pub status: CourseStatus,
    pub enrolled_count: usize,
}

/// Look up a course in the caller's tenant.
#[derive(Debug, Clone, Copy)]
pub struct GetCourse {
    pub course_id: CourseId,
}

impl Request for GetCourse {
    type Response = Option<CourseSummary>;
}

impl Query for GetCourse {}

pub struct GetCourseHandler {
    pub courses: Arc<CourseStore>,
}

#[async_trait]
impl RequestHandler<GetCourse> for GetCourseHandler {
    async fn handle(
        &self,
        ctx: &RequestContext,
        query: GetCourse,
    ) -> Result<Option<CourseSummary>, DomainError> {
        let tenant_id = ctx.tenant_id().ok_or(DomainError::TenantRequired)?;

        let Some(course) = self.courses.get(&query.course_id) else {
            return Ok(None);
        };
        let course = lock(&course)?;
        if course.tenant_id() != tenant_id {
            return Ok(None);
        }
        Ok(Some(CourseSummary {
            course_id: course.course_id(),
            title: course.title().to_string(),
            status: course.status(),
            enrolled_count: course.enrolled().len(),
        }))
    }
}
