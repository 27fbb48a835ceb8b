//! Process creation for job invocations.
//!
//! [`Launcher`] is the seam between the supervisor and the OS. The
//! production implementation, [`WorkerLauncher`], spawns a worker program
//! with the target name as its last argument. Launching is synchronous and
//! does not touch the child's stdin; the supervisor registers the process
//! first and only then hands the JSON [`JobPayload`] over with
//! [`write_payload`].

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use operator_core::job::{Invocation, JobPayload};
use operator_core::jobs::runner::RUN_JOB_COMMAND;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};

use crate::error::SupervisorError;

/// A spawned job process whose payload has not been written yet.
#[derive(Debug)]
pub struct Launched {
    /// The child, with stdin still piped if the launcher set one up.
    pub child: Child,
    /// Bytes to write to the child's stdin.
    pub payload: Vec<u8>,
}

/// Spawns the OS process for one job invocation.
pub trait Launcher: Send + Sync {
    /// Start a process running `invocation`.
    ///
    /// Returns as soon as the process exists; it may already have failed.
    /// Must not block on the child.
    fn launch(&self, job_uid: &str, invocation: &Invocation) -> Result<Launched, SupervisorError>;
}

/// Launches `program [leading args...] <target>` with the payload on stdin.
#[derive(Debug, Clone)]
pub struct WorkerLauncher {
    program: PathBuf,
    leading_args: Vec<OsString>,
    known_targets: Option<HashSet<String>>,
}

impl WorkerLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            known_targets: None,
        }
    }

    /// Re-execute the current binary in `run-job` mode.
    pub fn for_current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg(RUN_JOB_COMMAND))
    }

    /// Append an argument placed before the target name.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    /// Reject targets outside `targets` before spawning anything.
    pub fn known_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_targets = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    fn spawn_failure(job_uid: &str, reason: impl ToString) -> SupervisorError {
        SupervisorError::SpawnFailure {
            job_uid: job_uid.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Launcher for WorkerLauncher {
    fn launch(&self, job_uid: &str, invocation: &Invocation) -> Result<Launched, SupervisorError> {
        if let Some(known) = &self.known_targets {
            if !known.contains(&invocation.target) {
                return Err(Self::spawn_failure(
                    job_uid,
                    format!("unknown job target `{}`", invocation.target),
                ));
            }
        }

        let payload = serde_json::to_vec(&JobPayload {
            job_uid: job_uid.to_string(),
            arguments: invocation.arguments.clone(),
        })
        .map_err(|e| Self::spawn_failure(job_uid, e))?;

        // Children outlive the supervisor on purpose: no kill_on_drop.
        let child = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(&invocation.target)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_failure(job_uid, e))?;

        Ok(Launched { child, payload })
    }
}

/// Write `payload` to a job's stdin and close it, giving up after `timeout`.
///
/// Returns whether the whole payload was written. On failure the pipe is
/// closed anyway; the child sees a truncated document and its exit status
/// reports the outcome.
pub async fn write_payload(
    job_uid: &str,
    mut stdin: ChildStdin,
    payload: &[u8],
    timeout: Duration,
) -> bool {
    match tokio::time::timeout(timeout, stdin.write_all(payload)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(job_uid, error = %e, "Failed to write job payload");
            false
        }
        Err(_elapsed) => {
            tracing::warn!(
                job_uid,
                bytes = payload.len(),
                timeout_ms = timeout.as_millis() as u64,
                "Job did not read its payload in time, closing stdin",
            );
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
