use operator_core::types::JobUid;

/// Failures the supervisor reports to its callers.
///
/// Duplicate starts and stops of unknown jobs are not errors; they resolve
/// to the existing handle and `true` respectively.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The job process could not be created. No registry entry exists.
    #[error("Failed to spawn job {job_uid}: {reason}")]
    SpawnFailure { job_uid: JobUid, reason: String },

    /// The termination signal could not be delivered or awaited.
    #[error("Failed to terminate job {job_uid}: {reason}")]
    TerminationFailure { job_uid: JobUid, reason: String },
}
