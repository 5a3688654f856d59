pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AccessConfig;
use crate::services::{AuthService, Guardian, JwtService, KeyValueStore, OtpService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AccessConfig>,
    /// `None` when the stores behind the services are not PostgreSQL-backed.
    pub db: Option<PgPool>,
    pub kv: Arc<dyn KeyValueStore>,
    pub jwt: JwtService,
    pub auth: AuthService,
    pub otp: OtpService,
    pub guardian: Guardian,
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/sign-up", post(handlers::sign_up))
        .route("/auth/sign-in", post(handlers::sign_in))
        .route("/auth/refresh", post(handlers::refresh))
        .route(
            "/otp",
            post(handlers::create_otp).delete(handlers::delete_otp),
        )
        .route("/otp/verify", post(handlers::verify_otp))
        .route("/otp/resend", post(handlers::resend_otp))
        .merge(
            Router::new()
                .route("/auth/sign-out", post(handlers::sign_out))
                .layer(from_fn_with_state(
                    state.clone(),
                    middleware::auth_middleware,
                )),
        );

    let internal_routes = Router::new()
        .route("/auth/sign-in", post(handlers::sign_in_to_application))
        .route("/auth/refresh", post(handlers::refresh))
        .merge(
            Router::new()
                .route("/auth/sign-out", post(handlers::sign_out))
                .route("/guardian/check", post(handlers::check_permission))
                .layer(from_fn_with_state(
                    state.clone(),
                    middleware::auth_middleware,
                )),
        );

    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/public", public_routes)
        .nest("/api/v1/internal", internal_routes)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let postgres = match &state.db {
        Some(pool) => {
            db::health_check(pool).await.map_err(|e| {
                tracing::error!(error = %e, "PostgreSQL health check failed");
                AppError::ServiceUnavailable
            })?;
            "up"
        }
        None => "not_configured",
    };

    state.kv.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Redis health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgresql": postgres,
            "redis": "up"
        }
    })))
}
