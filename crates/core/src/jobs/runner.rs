//! Child-side job execution.
//!
//! The service binary re-executes itself as `<exe> run-job <target>` and
//! writes a JSON [`JobPayload`] to the child's stdin. [`run`] decodes the
//! payload, resolves the target, invokes it, and returns the exit code the
//! process should terminate with.

use std::io::Read;

use crate::job::JobPayload;

use super::registry::JobRegistry;

/// Subcommand that switches the service binary into job-runner mode.
pub const RUN_JOB_COMMAND: &str = "run-job";

/// Exit code for a malformed payload or an unknown target.
pub const EXIT_INVALID_INVOCATION: i32 = 2;

/// Run `target` with the payload read from `input`.
pub fn run(registry: &JobRegistry, target: &str, mut input: impl Read) -> i32 {
    let mut raw = String::new();
    if let Err(e) = input.read_to_string(&mut raw) {
        tracing::error!(target, error = %e, "Failed to read job payload");
        return EXIT_INVALID_INVOCATION;
    }

    let payload: JobPayload = match serde_json::from_str(&raw) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(target, error = %e, "Invalid job payload");
            return EXIT_INVALID_INVOCATION;
        }
    };

    let Some(job) = registry.resolve(target) else {
        tracing::error!(job_uid = %payload.job_uid, target, "Unknown job target");
        return EXIT_INVALID_INVOCATION;
    };

    let span = tracing::info_span!("job", job_uid = %payload.job_uid, target);
    let _entered = span.enter();

    tracing::info!(pid = std::process::id(), "Job started");
    match job(&payload.arguments) {
        Ok(()) => {
            tracing::info!("Job finished");
            0
        }
        Err(e) => {
            let code = e.exit_code();
            tracing::error!(error = %e, code, "Job failed");
            code
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
