//! Route definitions for the `/operator` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::operator;
use crate::state::AppState;

/// Routes mounted at `/operator`.
///
/// ```text
/// POST   /add_job        -> add_jobs
/// POST   /stop_job       -> stop_jobs      (?job_uids=a&job_uids=b)
/// GET    /job_status     -> job_status     (?job_uid=a)
/// GET    /all_jobs       -> all_jobs
/// POST   /stop_all       -> stop_all_jobs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add_job", post(operator::add_jobs))
        .route("/stop_job", post(operator::stop_jobs))
        .route("/job_status", get(operator::job_status))
        .route("/all_jobs", get(operator::all_jobs))
        .route("/stop_all", post(operator::stop_all_jobs))
}
