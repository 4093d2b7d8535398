//! System endpoints: health check and relay status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::error::{ErrorResponse, ManagerError};
use crate::service::StatusSnapshot;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /status` — Tournament, plugin link, sessions and arena occupancy.
///
/// # Errors
///
/// Returns [`ManagerError::Unavailable`] (503) when the orchestrator loop
/// has stopped.
#[utoipa::path(
    get,
    path = "/status",
    tag = "System",
    summary = "Relay status",
    description = "Returns the tournament flag, plugin link state, connection counts by role, \
                   roster size, and the occupants of every arena.",
    responses(
        (status = 200, description = "Current relay state", body = StatusSnapshot),
        (status = 503, description = "Orchestrator unavailable", body = ErrorResponse),
    )
)]
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusSnapshot>, ManagerError> {
    let snapshot = state.orchestrator.status().await?;
    Ok(Json(snapshot))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
}
