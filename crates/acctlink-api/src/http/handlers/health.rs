//! Liveness endpoint reporting which storage backend is serving.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /health
///
/// `status` is `degraded` when no backend would accept a request right now.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let backend = state.storage.current_backend().await;
    let status = if backend.is_some() { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "backend": backend,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
