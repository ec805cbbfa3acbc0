//! services/api/src/web/middleware.rs
//!
//! Admin gate for the study-entry route.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::web::state::AppState;

pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

/// Middleware that compares the `x-admin-password` header with the configured
/// admin password.
///
/// With no admin password configured every request is refused with 403.
/// A missing or wrong header returns 401.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Is the admin route enabled at all?
    let expected = state
        .config
        .admin_password
        .as_deref()
        .ok_or(StatusCode::FORBIDDEN)?;

    // 2. Extract the password header
    let supplied = req
        .headers()
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Compare
    if supplied != expected {
        warn!("Rejected admin request with a wrong password");
        return Err(StatusCode::UNAUTHORIZED);
    }

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
