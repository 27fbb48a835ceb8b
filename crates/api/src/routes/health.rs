use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Configured service name.
    pub app_name: String,
    /// Number of job processes currently registered.
    pub running_jobs: usize,
    /// Whether the process monitor is running.
    pub monitor_active: bool,
}

/// GET /health -- returns service health and supervisor load.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let monitor_active = state.supervisor.is_monitoring();

    Json(HealthResponse {
        status: if monitor_active { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        app_name: state.config.app_name.clone(),
        running_jobs: state.supervisor.job_count(),
        monitor_active,
    })
}

/// Mount health check routes (root level, not under `/operator`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
