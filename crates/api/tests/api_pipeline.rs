//! End-to-end tests over the wired router: context resolution, command
//! dispatch, and the background relay feeding subscribers.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use campushub_api::app::{App, build_app};
use campushub_infra::RelayConfig;

const SECRET: &[u8] = b"integration-test-secret";

fn test_app() -> App {
    // Tight relay timings so tests observe delivery quickly.
    build_app(
        SECRET,
        RelayConfig {
            poll_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(10),
        },
    )
    .unwrap()
}

fn mint_token(user_id: Uuid, tenant_id: Option<Uuid>) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "sub": user_id,
        "email": "user@example.com",
        "name": "Test User",
        "tenant_id": tenant_id,
        "roles": ["member"],
        "iat": now - 60,
        "exp": now + 600,
    });
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &App, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create_tenant(app: &App, name: &str) -> Uuid {
    let (status, body) = send(
        app,
        json_request("POST", "/tenants", json!({ "name": name, "plan": "standard" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["tenantId"].as_str().unwrap().parse().unwrap()
}

async fn activate_tenant(app: &App, tenant_id: Uuid) {
    let (status, _) = send(
        app,
        Request::builder()
            .method("POST")
            .uri(format!("/tenants/{tenant_id}/activate"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

/// Poll until `probe` returns true or the deadline passes.
async fn wait_for(mut probe: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if probe() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn health_needs_no_credentials() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn invalid_bearer_token_is_rejected() {
    let app = test_app();
    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/me")
            .header(header::AUTHORIZATION, "Bearer not.a.jwt")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// An active tenant named in the override header wins over the token claim.
#[tokio::test]
async fn tenant_header_takes_precedence_over_claim() {
    let app = test_app();
    let header_tenant = create_tenant(&app, "Header Tenant").await;
    let claim_tenant = create_tenant(&app, "Claim Tenant").await;
    activate_tenant(&app, header_tenant).await;

    let token = mint_token(Uuid::now_v7(), Some(claim_tenant));
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header("x-tenant-id", header_tenant.to_string())
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAuthenticated"], true);
    assert_eq!(
        body["tenant"]["tenantId"].as_str().unwrap(),
        header_tenant.to_string()
    );
}

/// Without a header, the claim tenant scopes the request.
#[tokio::test]
async fn claim_tenant_is_used_when_no_header_is_present() {
    let app = test_app();
    let tenant_id = create_tenant(&app, "Claim Tenant").await;

    let token = mint_token(Uuid::now_v7(), Some(tenant_id));
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["tenant"]["tenantId"].as_str().unwrap(),
        tenant_id.to_string()
    );
}

/// A tenant-scoped command without any resolved tenant fails with 400 before
/// touching state.
#[tokio::test]
async fn course_creation_without_tenant_context_is_rejected() {
    let app = test_app();
    let (status, body) = send(
        &app,
        json_request("POST", "/courses", json!({ "title": "Rust for Beginners" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "tenant_required");
    assert!(app.services.courses.is_empty());
}

/// Full pipeline: commands append events, the relay drains them, subscribers
/// observe them exactly once.
#[tokio::test]
async fn events_flow_from_commands_through_the_relay_to_subscribers() {
    let app = test_app();

    let tenant_id = create_tenant(&app, "Acme Academy").await;
    activate_tenant(&app, tenant_id).await;

    let welcome = app.services.welcome.clone();
    assert!(
        wait_for(move || !welcome.sent().is_empty()).await,
        "welcome notification never delivered"
    );
    assert_eq!(app.services.welcome.sent(), vec!["Acme Academy".to_string()]);

    // Course lifecycle under the tenant's scope.
    let token = mint_token(Uuid::now_v7(), Some(tenant_id));
    let bearer = format!("Bearer {token}");

    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/courses")
            .header(header::AUTHORIZATION, &bearer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "title": "Rust for Beginners" }).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let course_id: Uuid = body["courseId"].as_str().unwrap().parse().unwrap();

    for path in [
        format!("/courses/{course_id}/publish"),
        format!("/courses/{course_id}/enroll"),
    ] {
        let (status, _) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let enrollments = app.services.enrollments.clone();
    assert!(
        wait_for(move || enrollments.count(course_id.into()) == 1).await,
        "enrollment count never updated"
    );

    // Buffers drain once delivered: a follow-up scan finds nothing pending.
    let unit_of_work = app.services.unit_of_work.clone();
    assert!(
        wait_for(move || {
            use campushub_infra::UnitOfWork;
            unit_of_work
                .scan_pending()
                .map(|batches| batches.is_empty())
                .unwrap_or(false)
        })
        .await,
        "event buffers never drained"
    );

    // Audit saw every kind exactly once.
    let kinds: Vec<_> = app
        .services
        .audit
        .entries()
        .iter()
        .map(|entry| entry.kind)
        .collect();
    for kind in [
        "tenant.created",
        "tenant.activated",
        "course.created",
        "course.published",
        "course.enrolled",
    ] {
        assert_eq!(
            kinds.iter().filter(|k| **k == kind).count(),
            1,
            "expected exactly one audit entry for {kind}"
        );
    }

    app.relay.shutdown().await;
}

/// Duplicate enrollment is a domain conflict, mapped to 409.
#[tokio::test]
async fn duplicate_enrollment_maps_to_conflict() {
    let app = test_app();
    let tenant_id = create_tenant(&app, "Acme Academy").await;
    activate_tenant(&app, tenant_id).await;

    let token = mint_token(Uuid::now_v7(), Some(tenant_id));
    let bearer = format!("Bearer {token}");

    let (_, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/courses")
            .header(header::AUTHORIZATION, &bearer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "title": "Rust for Beginners" }).to_string()))
            .unwrap(),
    )
    .await;
    let course_id: Uuid = body["courseId"].as_str().unwrap().parse().unwrap();

    let post = |path: String, bearer: String| {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, post(format!("/courses/{course_id}/publish"), bearer.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, post(format!("/courses/{course_id}/enroll"), bearer.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, post(format!("/courses/{course_id}/enroll"), bearer)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}
