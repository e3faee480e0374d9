use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// Prometheus metrics endpoint
#[tracing::instrument(skip(state))]
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ErrorResponse> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ErrorResponse::new("not_found", "Metrics recorder not installed"))?;
    Ok((StatusCode::OK, handle.render()))
}
