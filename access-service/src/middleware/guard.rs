use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{models::RequestContext, AppState};

/// Application and service a group of internal routes belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRoute {
    pub application: &'static str,
    pub service: &'static str,
}

impl ServiceRoute {
    pub const fn new(application: &'static str, service: &'static str) -> Self {
        Self {
            application,
            service,
        }
    }
}

/// Ask the guardian whether the caller may use the route's service with the
/// request's HTTP method. Must run after `auth_middleware`.
///
/// ```ignore
/// const INVOICES: ServiceRoute = ServiceRoute::new("billing", "invoices");
///
/// Router::new()
///     .route("/invoices", get(list).post(create))
///     .layer(from_fn_with_state((state.clone(), INVOICES), permission_middleware))
///     .layer(from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn permission_middleware(
    State((state, route)): State<(AppState, ServiceRoute)>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = req.extensions().get::<RequestContext>().cloned().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!("Request context missing from request extensions"))
    })?;

    let method = req.method().as_str().to_string();
    state
        .guardian
        .authorize(&ctx, route.application, route.service, &method)
        .await?;

    Ok(next.run(req).await)
}
