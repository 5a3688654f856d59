use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    middleware::AuthUser,
    models::{ApplicationSignInRequest, RefreshRequest, SignInRequest, SignUpRequest},
    utils::ValidatedJson,
    AppState,
};

/// Create an account.
#[tracing::instrument(skip(state, req))]
pub async fn sign_up(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.sign_up(req).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange email and password for tokens.
#[tracing::instrument(skip(state, req))]
pub async fn sign_in(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignInRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.sign_in(req).await?;

    Ok((StatusCode::OK, Json(res)))
}

/// Exchange credentials for tokens bound to one application.
#[tracing::instrument(skip(state, req), fields(application = %req.application))]
pub async fn sign_in_to_application(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ApplicationSignInRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.sign_in_to_application(req).await?;

    Ok((StatusCode::OK, Json(res)))
}

/// Rotate a refresh token.
#[tracing::instrument(skip(state, req))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.refresh(&req.refresh_token).await?;

    Ok((StatusCode::OK, Json(res)))
}

/// Clear the caller's stored refresh token.
#[tracing::instrument(skip(state, user), fields(user_id = user.0.user_id))]
pub async fn sign_out(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    state.auth.sign_out(user.0.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
