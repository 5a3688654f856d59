use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    models::{OtpRequest, OtpResponse, OtpState, VerifyOtpRequest},
    utils::ValidatedJson,
    AppState,
};

#[tracing::instrument(skip(state, req), fields(channel = %req.channel))]
pub async fn create_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<OtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.otp.create(req.channel, &req.value).await?;

    Ok((
        StatusCode::CREATED,
        Json(OtpResponse {
            channel: req.channel,
            state: OtpState::Pending,
        }),
    ))
}

#[tracing::instrument(skip(state, req), fields(channel = %req.channel))]
pub async fn verify_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.otp.verify(req.channel, &req.value, &req.code).await?;

    Ok((
        StatusCode::OK,
        Json(OtpResponse {
            channel: req.channel,
            state: OtpState::Verified,
        }),
    ))
}

#[tracing::instrument(skip(state, req), fields(channel = %req.channel))]
pub async fn resend_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<OtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.otp.resend(req.channel, &req.value).await?;

    Ok((
        StatusCode::OK,
        Json(OtpResponse {
            channel: req.channel,
            state: OtpState::Pending,
        }),
    ))
}

#[tracing::instrument(skip(state, req), fields(channel = %req.channel))]
pub async fn delete_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<OtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.otp.delete(req.channel, &req.value).await?;

    Ok(StatusCode::NO_CONTENT)
}
