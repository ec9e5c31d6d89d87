//! Axum router configuration with middleware.
//!
//! Link workflow routes live under `/providers`, the review queue under
//! `/admin`. Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health))
        // Link workflow
        .route("/providers", get(handlers::link::list_providers))
        .route("/providers/{id}/auth", post(handlers::link::begin))
        .route(
            "/providers/{id}/verify-challenge",
            post(handlers::link::submit_challenge),
        )
        .route("/providers/{id}/accounts", get(handlers::link::list_accounts))
        .route("/providers/{id}/sync", post(handlers::link::confirm_sync))
        .route("/providers/{id}/session", delete(handlers::link::cancel))
        // Review queue
        .route("/admin/submissions", get(handlers::admin::list_submissions))
        .route("/admin/submissions/{id}", get(handlers::admin::get_submission))
        .route("/admin/action", post(handlers::admin::decide))
        .route("/admin/stats", get(handlers::admin::stats))
        .route("/admin/challenges", get(handlers::admin::issued_challenges))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
