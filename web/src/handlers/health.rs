use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// Liveness endpoint
#[tracing::instrument]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness endpoint: obtains the shared connection and pings it
#[tracing::instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<impl IntoResponse, ErrorResponse> {
    let handle = state
        .redis
        .get()
        .await
        .map_err(|e| ErrorResponse::new("unavailable", e.to_string()))?;

    handle
        .ping()
        .await
        .map_err(|e| ErrorResponse::new("unavailable", e.to_string()))?;

    Ok(Json(json!({
        "status": "ready",
        "redis": handle.endpoint(),
    })))
}
