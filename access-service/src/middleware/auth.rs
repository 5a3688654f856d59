use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;

use crate::{models::RequestContext, AppState};

/// Verify the bearer access token and attach a [`RequestContext`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header")))?;

    let claims = state
        .jwt
        .validate_access_token(token)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

    let user_id = claims
        .user_id()
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

    let mut ctx = RequestContext::new(user_id, claims.username.clone(), claims.email.clone());
    if let Some(grant) = claims.application() {
        ctx = ctx.with_application(grant);
    }
    if let Some(request_id) = req.extensions().get::<RequestId>() {
        ctx = ctx.with_request_id(request_id.as_str());
    }

    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

/// Extractor for the caller identity set by [`auth_middleware`].
pub struct AuthUser(pub RequestContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts.extensions.get::<RequestContext>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Request context missing from request extensions"))
        })?;

        Ok(AuthUser(ctx.clone()))
    }
}
