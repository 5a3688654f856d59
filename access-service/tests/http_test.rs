//! End-to-end HTTP behaviour through the router and middleware stack.

mod common;

use access_service::{
    middleware::{auth_middleware, permission_middleware, ServiceRoute},
    models::{OtpChannel, Role},
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    middleware::from_fn_with_state,
    response::Response,
    routing::get,
    Router,
};
use common::TestApp;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const INVOICES: ServiceRoute = ServiceRoute::new("billing", "invoices");

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    req
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn grant_billing(app: &TestApp, user_id: i64, permissions: &[&str]) {
    app.seed_billing(true, true);
    app.permissions.grant_access(user_id, 7).unwrap();
    app.permissions
        .assign_role(
            user_id,
            Role {
                id: 5,
                application_id: 7,
                slug: "7-clerk".to_string(),
                name: "Clerk".to_string(),
            },
        )
        .unwrap();
    app.permissions.grant_permissions(5, 70, permissions).unwrap();
}

#[tokio::test]
async fn health_reports_store_checks() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "access-service-test");
    assert_eq!(body["checks"]["redis"], "up");
    assert_eq!(body["checks"]["postgresql"], "not_configured");
}

#[tokio::test]
async fn sign_up_is_gated_on_verified_otps() {
    let app = TestApp::new();
    let sign_up = json!({
        "email": "hank@example.com",
        "phone_number": "081277777777",
        "username": "hank",
        "password": "long enough password"
    });

    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/public/auth/sign-up", sign_up.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for (channel, value) in [("phone", "081277777777"), ("email", "hank@example.com")] {
        let response = app
            .router()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/public/otp",
                json!({ "channel": channel, "value": value }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["state"], "pending");

        let parsed: OtpChannel = channel.parse().unwrap();
        let code = app.otp_code(parsed, value).await;
        let response = app
            .router()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/public/otp/verify",
                json!({ "channel": channel, "value": value, "code": code }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["state"], "verified");
    }

    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/public/auth/sign-up", sign_up))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["username"], "hank");
    assert_eq!(body["phone_number"], "+6281277777777");
    assert!(body.get("password").is_none());
    assert!(body.get("refresh_token").is_none());
}

#[tokio::test]
async fn malformed_otp_requests_are_rejected() {
    let app = TestApp::new();

    let short_code = app
        .router()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/public/otp/verify",
            json!({ "channel": "email", "value": "a@example.com", "code": "123" }),
        ))
        .await
        .unwrap();
    assert_eq!(short_code.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let bad_channel = app
        .router()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/public/otp",
            json!({ "channel": "fax", "value": "a@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(bad_channel.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn otp_errors_map_to_statuses() {
    let app = TestApp::new();
    let create = json!({ "channel": "email", "value": "ivy@example.com" });

    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/public/otp", create.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/public/otp", create.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    for _ in 0..3 {
        let response = app
            .router()
            .oneshot(json_request(Method::POST, "/api/v1/public/otp/resend", create.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/public/otp/resend", create.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app
        .router()
        .oneshot(json_request(Method::DELETE, "/api/v1/public/otp", create.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .router()
        .oneshot(json_request(Method::DELETE, "/api/v1/public/otp", create))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sign_in_refresh_and_sign_out() {
    let app = TestApp::without_otp_gate();
    app.seed_user(1, "jo@example.com", "+6281288888888", "jo", "password123");
    let credentials = json!({ "email": "jo@example.com", "password": "password123" });

    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/public/auth/sign-in", credentials.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    let access = body["access_token"].as_str().unwrap().to_string();
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/public/auth/sign-in", credentials))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await.get("refresh_token").is_none());

    let response = app
        .router()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/public/auth/refresh",
            json!({ "refresh_token": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/public/auth/refresh",
            json!({ "refresh_token": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/public/auth/sign-out", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(with_bearer(
            json_request(Method::POST, "/api/v1/public/auth/sign-out", json!({})),
            &access,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::without_otp_gate();
    app.seed_user(1, "jo@example.com", "+6281288888888", "jo", "password123");

    let response = app
        .router()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/public/auth/sign-in",
            json!({ "email": "jo@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn internal_sign_in_is_scoped_to_an_application() {
    let app = TestApp::without_otp_gate();
    let user = app.seed_user(3, "lee@example.com", "+6281277777777", "lee", "password123");
    let credentials = json!({
        "email": "lee@example.com",
        "password": "password123",
        "application": "billing"
    });

    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/internal/auth/sign-in", credentials.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "error": "Forbidden" }));

    grant_billing(&app, user.id, &["get"]);
    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/internal/auth/sign-in", credentials))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let access = body["access_token"].as_str().unwrap().to_string();
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let claims = app.state.jwt.validate_access_token(&access).unwrap();
    assert_eq!(claims.app_id, Some(7));

    let response = app
        .router()
        .oneshot(with_bearer(
            json_request(
                Method::POST,
                "/api/v1/internal/guardian/check",
                json!({ "application": "billing", "service": "invoices", "method": "GET" }),
            ),
            &access,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({ "granted": true }));

    let response = app
        .router()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/internal/auth/refresh",
            json!({ "refresh_token": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(with_bearer(
            json_request(Method::POST, "/api/v1/internal/auth/sign-out", json!({})),
            &access,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn guardian_check_returns_only_the_outcome() {
    let app = TestApp::new();
    let user = app.seed_user(42, "kim@example.com", "+6281299999999", "kim", "password123");
    grant_billing(&app, user.id, &["get", "post"]);
    let token = app.access_token_for(&user);

    let allowed = app
        .router()
        .oneshot(with_bearer(
            json_request(
                Method::POST,
                "/api/v1/internal/guardian/check",
                json!({ "application": "billing", "service": "invoices", "method": "POST" }),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(body_json(allowed).await, json!({ "granted": true }));

    let denied = app
        .router()
        .oneshot(with_bearer(
            json_request(
                Method::POST,
                "/api/v1/internal/guardian/check",
                json!({ "application": "billing", "service": "invoices", "method": "DELETE" }),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::OK);
    assert_eq!(body_json(denied).await, json!({ "granted": false }));
}

#[tokio::test]
async fn guardian_check_requires_a_token() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(with_bearer(
            json_request(
                Method::POST,
                "/api/v1/internal/guardian/check",
                json!({ "application": "billing", "service": "invoices", "method": "GET" }),
            ),
            "garbage",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

fn guarded_router(app: &TestApp) -> Router {
    Router::new()
        .route("/invoices", get(|| async { "listed" }).delete(|| async { "deleted" }))
        .layer(from_fn_with_state(
            (app.state.clone(), INVOICES),
            permission_middleware,
        ))
        .layer(from_fn_with_state(app.state.clone(), auth_middleware))
}

#[tokio::test]
async fn permission_middleware_lets_permitted_methods_through() {
    let app = TestApp::new();
    let user = app.seed_user(42, "kim@example.com", "+6281299999999", "kim", "password123");
    grant_billing(&app, user.id, &["get"]);
    let token = app.access_token_for(&user);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/invoices")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = guarded_router(&app).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn permission_middleware_denies_with_a_generic_forbidden() {
    let app = TestApp::new();
    let user = app.seed_user(42, "kim@example.com", "+6281299999999", "kim", "password123");
    grant_billing(&app, user.id, &["get"]);
    let token = app.access_token_for(&user);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/invoices")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = guarded_router(&app).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "error": "Forbidden" }));
}

#[tokio::test]
async fn permission_middleware_hides_why_access_was_denied() {
    let app = TestApp::new();
    let user = app.seed_user(42, "kim@example.com", "+6281299999999", "kim", "password123");
    let token = app.access_token_for(&user);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/invoices")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = guarded_router(&app).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "error": "Forbidden" }));
}
