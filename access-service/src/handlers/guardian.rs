use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use crate::{middleware::AuthUser, utils::ValidatedJson, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct PermissionCheckRequest {
    #[validate(length(min = 1, max = 128))]
    pub application: String,
    #[validate(length(min = 1, max = 128))]
    pub service: String,
    #[validate(length(min = 1, max = 16))]
    pub method: String,
}

/// Only the outcome leaves the service; the denial reason stays in the logs.
#[derive(Debug, Serialize)]
pub struct PermissionCheckResponse {
    pub granted: bool,
}

/// Resolve a permission for the authenticated caller.
#[tracing::instrument(skip(state, user, req), fields(user_id = user.0.user_id))]
pub async fn check_permission(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<PermissionCheckRequest>,
) -> Result<impl IntoResponse, AppError> {
    let decision = state
        .guardian
        .check(&user.0, &req.application, &req.service, &req.method)
        .await?;

    Ok((
        StatusCode::OK,
        Json(PermissionCheckResponse {
            granted: decision.is_granted(),
        }),
    ))
}
