//! Handlers for the `/operator` resource.
//!
//! Batch endpoints report per-item outcomes; one bad job never fails the
//! whole request.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::Json;
use operator_core::error::CoreError;
use operator_core::job::JobDescriptor;
use operator_core::types::JobUid;
use operator_supervisor::{JobStatusReport, ProcessStatus};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Outcome of one item of a batch request.
#[derive(Debug, Serialize)]
pub struct JobResult {
    pub job_uid: JobUid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResult {
    fn ok(job_uid: impl Into<JobUid>) -> Self {
        Self {
            job_uid: job_uid.into(),
            success: true,
            error: None,
        }
    }

    fn failed(job_uid: impl Into<JobUid>, error: impl ToString) -> Self {
        Self {
            job_uid: job_uid.into(),
            success: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobStatusQuery {
    pub job_uid: JobUid,
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// POST /operator/add_job
///
/// Launch one process per descriptor. A descriptor whose UID is already
/// running is reported as a success without spawning again. An empty
/// batch is rejected.
pub async fn add_jobs(
    State(state): State<AppState>,
    Json(jobs): Json<Vec<JobDescriptor>>,
) -> AppResult<Json<DataResponse<Vec<JobResult>>>> {
    if jobs.is_empty() {
        return Err(CoreError::Validation("At least one job is required".into()).into());
    }

    let mut results = Vec::with_capacity(jobs.len());

    for job in jobs {
        let job_uid = job.job_uid.clone();
        let invocation = match job.invocation() {
            Ok(invocation) => invocation,
            Err(e) => {
                tracing::warn!(job_uid = %job_uid, error = %e, "Rejected job descriptor");
                results.push(JobResult::failed(job_uid, e));
                continue;
            }
        };

        match state.supervisor.start(&job_uid, invocation, job) {
            Ok(_) => results.push(JobResult::ok(job_uid)),
            Err(e) => {
                tracing::error!(job_uid = %job_uid, error = %e, "Failed to start job");
                results.push(JobResult::failed(job_uid, e));
            }
        }
    }

    Ok(Json(DataResponse { data: results }))
}

// ---------------------------------------------------------------------------
// Stop
// ---------------------------------------------------------------------------

/// POST /operator/stop_job?job_uids=a&job_uids=b
///
/// Also accepts comma separated UIDs (`?job_uids=a,b`). At least one UID
/// is required.
pub async fn stop_jobs(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<DataResponse<Vec<JobResult>>>> {
    let job_uids = collect_job_uids(&params);
    if job_uids.is_empty() {
        return Err(AppError::BadRequest(
            "At least one job_uids query parameter is required".into(),
        ));
    }

    tracing::info!(?job_uids, "Stopping jobs");
    let timeout = state.supervisor.config().stop_timeout;

    let mut results = Vec::with_capacity(job_uids.len());
    for job_uid in job_uids {
        let success = state.supervisor.stop(&job_uid, timeout).await;
        results.push(JobResult {
            job_uid,
            success,
            error: None,
        });
    }

    Ok(Json(DataResponse { data: results }))
}

/// POST /operator/stop_all
pub async fn stop_all_jobs(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<JobResult>>> {
    let timeout = state.supervisor.config().stop_timeout;
    let results = state
        .supervisor
        .stop_all(timeout)
        .await
        .into_iter()
        .map(|(job_uid, success)| JobResult {
            job_uid,
            success,
            error: None,
        })
        .collect();

    Json(DataResponse { data: results })
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /operator/job_status?job_uid=a
pub async fn job_status(
    State(state): State<AppState>,
    Query(query): Query<JobStatusQuery>,
) -> AppResult<Json<DataResponse<JobStatusReport>>> {
    let job_uid = query.job_uid.trim();
    if job_uid.is_empty() {
        return Err(CoreError::Validation("job_uid must not be empty".into()).into());
    }

    Ok(Json(DataResponse {
        data: state.supervisor.job_status(job_uid),
    }))
}

/// GET /operator/all_jobs
pub async fn all_jobs(
    State(state): State<AppState>,
) -> Json<DataResponse<BTreeMap<JobUid, ProcessStatus>>> {
    Json(DataResponse {
        data: state.supervisor.all_processes(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Gather `job_uids` values, splitting comma separated lists and dropping
/// blanks and repeats while keeping request order.
fn collect_job_uids(params: &[(String, String)]) -> Vec<JobUid> {
    let mut job_uids: Vec<JobUid> = Vec::new();
    for (key, value) in params {
        if key != "job_uids" {
            continue;
        }
        for job_uid in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !job_uids.iter().any(|existing| existing == job_uid) {
                job_uids.push(job_uid.to_string());
            }
        }
    }
    job_uids
}
