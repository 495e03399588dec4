//! Application wiring: stores, subscribers, publisher, mediator, relay, and
//! the axum router, assembled once at startup.

pub mod errors;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use axum::Extension;
use axum::Router;
use axum::routing::{get, post};

use campushub_auth::Hs256JwtValidator;
use campushub_dispatch::Mediator;
use campushub_events::EventPublisher;
use campushub_infra::{
    AuditTrailSubscriber, EnrollmentCounterSubscriber, EventRelay, InMemoryStore,
    InMemoryUnitOfWork, RelayConfig, RelayHandle, WelcomeNotificationSubscriber,
};

use crate::middleware::{AuthState, context_middleware};
use handlers::{
    ActivateTenant, ActivateTenantHandler, CourseStore, CreateCourse, CreateCourseHandler,
    CreateTenant, CreateTenantHandler, EnrollStudent, EnrollStudentHandler, GetCourse,
    GetCourseHandler, GetTenant, GetTenantHandler, PublishCourse, PublishCourseHandler,
    TenantStore,
};

/// Long-lived services shared by every request.
pub struct AppServices {
    pub mediator: Mediator,
    pub tenants: Arc<TenantStore>,
    pub courses: Arc<CourseStore>,
    pub unit_of_work: Arc<InMemoryUnitOfWork>,
    pub audit: Arc<AuditTrailSubscriber>,
    pub welcome: Arc<WelcomeNotificationSubscriber>,
    pub enrollments: Arc<EnrollmentCounterSubscriber>,
}

/// A fully wired application: router plus the running relay.
pub struct App {
    pub router: Router,
    pub relay: RelayHandle,
    pub services: Arc<AppServices>,
}

/// Wire stores, subscribers, the mediator, and the relay into a router.
///
/// The relay task is spawned here, so this must run on a tokio runtime.
pub fn build_app(jwt_secret: &[u8], relay_config: RelayConfig) -> anyhow::Result<App> {
    let tenants: Arc<TenantStore> = Arc::new(InMemoryStore::new());
    let courses: Arc<CourseStore> = Arc::new(InMemoryStore::new());
    let unit_of_work = Arc::new(InMemoryUnitOfWork::new());

    let audit = Arc::new(AuditTrailSubscriber::new());
    let welcome = Arc::new(WelcomeNotificationSubscriber::new());
    let enrollments = Arc::new(EnrollmentCounterSubscriber::new());

    let mut publisher = EventPublisher::builder();
    for kind in [
        "tenant.created",
        "tenant.activated",
        "tenant.deactivated",
        "course.created",
        "course.published",
        "course.enrolled",
    ] {
        publisher = publisher.subscribe(kind, audit.clone());
    }
    let publisher = publisher
        .subscribe("tenant.created", welcome.clone())
        .subscribe("course.enrolled", enrollments.clone())
        .build();

    let mediator = Mediator::builder()
        .register_command::<CreateTenant, _>(CreateTenantHandler {
            tenants: tenants.clone(),
            unit_of_work: unit_of_work.clone(),
        })?
        .register_command::<ActivateTenant, _>(ActivateTenantHandler {
            tenants: tenants.clone(),
        })?
        .register_query::<GetTenant, _>(GetTenantHandler {
            tenants: tenants.clone(),
        })?
        .register_command::<CreateCourse, _>(CreateCourseHandler {
            courses: courses.clone(),
            unit_of_work: unit_of_work.clone(),
        })?
        .register_command::<PublishCourse, _>(PublishCourseHandler {
            courses: courses.clone(),
        })?
        .register_command::<EnrollStudent, _>(EnrollStudentHandler {
            courses: courses.clone(),
        })?
        .register_query::<GetCourse, _>(GetCourseHandler {
            courses: courses.clone(),
        })?
        .build();

    let relay = EventRelay::new(unit_of_work.clone(), Arc::new(publisher), relay_config).spawn();

    let services = Arc::new(AppServices {
        mediator,
        tenants: tenants.clone(),
        courses,
        unit_of_work,
        audit,
        welcome,
        enrollments,
    });

    let auth_state = AuthState {
        jwt: Arc::new(Hs256JwtValidator::new(jwt_secret.to_vec())),
        directory: tenants,
    };

    let router = Router::new()
        .route("/health", get(routes::system::health))
        .route("/me", get(routes::system::me))
        .route("/tenants", post(routes::tenants::create_tenant))
        .route("/tenants/:id", get(routes::tenants::get_tenant))
        .route("/tenants/:id/activate", post(routes::tenants::activate_tenant))
        .route("/courses", post(routes::courses::create_course))
        .route("/courses/:id", get(routes::courses::get_course))
        .route("/courses/:id/publish", post(routes::courses::publish_course))
        .route("/courses/:id/enroll", post(routes::courses::enroll_student))
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            context_middleware,
        ));

    Ok(App {
        router,
        relay,
        services,
    })
}
