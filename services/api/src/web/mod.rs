pub mod charts;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_admin;
pub use rest::{
    get_comments_handler, get_dashboard_handler, get_study_handler, post_comment_handler,
    post_study_handler,
};
pub use state::AppState;

/// Builds the API routes. CORS, tracing and the Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes
    let public_routes = Router::new()
        .route("/api/dashboard", get(get_dashboard_handler))
        .route("/api/study", get(get_study_handler))
        .route("/api/comments", get(get_comments_handler).post(post_comment_handler))
        .route("/charts/daily.svg", get(charts::daily_chart_handler))
        .route("/charts/cumulative.svg", get(charts::cumulative_chart_handler));

    // Admin routes (shared password required)
    let admin_routes = Router::new()
        .route("/api/admin/study", post(post_study_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(app_state)
}
