use super::authentication::auth_context;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::info;

/// Let the request through only if the resolved identity is an admin.
///
/// Runs after `require_identity`. Decided on the stored user, so a missing
/// user or role is refused.
pub async fn check_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = auth_context(&request)?.identity.clone();

    if let Err(e) = state.auth_service.require_admin(&identity).await {
        info!("Admin access refused for {}: {}", identity.username, e);
        return Err(e.into());
    }

    Ok(next.run(request).await)
}
