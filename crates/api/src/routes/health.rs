use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Health check routes. `get` also answers `HEAD`, which clients use as a
/// connectivity check.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/ping", get(ping))
}

/// Full health check: verifies storage connectivity.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .shelf()
        .ping()
        .await
        .map_err(|e| ApiError::Internal(format!("storage health check failed: {e}")))?;

    let bus = state.shelf().bus();
    Ok(Json(json!({
        "status": "ok",
        "storage": "connected",
        "subscribers": bus.subscriber_count(),
        "topics": bus.topic_count(),
    })))
}

/// Lightweight ping, no storage check.
async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
