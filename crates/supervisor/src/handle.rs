//! Process handles: one running job process plus its metadata.
//!
//! The OS child is owned by the handle and never exposed. Callers outside
//! this crate only see [`ProcessInfo`] / [`ProcessStatus`] snapshots; the
//! supervisor probes, signals, and reaps through crate-private methods.

use std::fmt;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use operator_core::job::JobDescriptor;
use operator_core::types::{JobUid, Timestamp};
use serde::Serialize;
use tokio::process::Child;
use tokio::sync::Mutex;

/// Externally reported state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Registered and the OS process is alive.
    Running,
    /// Registered but the process has exited and is awaiting the monitor.
    Stopped,
    /// Not in the registry.
    NotFound,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::NotFound => "not_found",
        }
    }
}

/// Read-only snapshot of a registered job.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub job_uid: JobUid,
    pub pid: Option<u32>,
    pub start_time: Timestamp,
    pub job: JobDescriptor,
}

/// Per-job entry of [`Supervisor::all_processes`](crate::Supervisor::all_processes).
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatus {
    pub status: JobState,
    pub pid: Option<u32>,
    pub start_time: Timestamp,
}

/// Result of a liveness probe.
#[derive(Debug)]
pub(crate) enum Liveness {
    Running,
    /// Another task holds the child (a stop is in progress).
    Busy,
    Exited(ExitStatus),
}

/// How an explicit stop ended.
#[derive(Debug)]
pub enum Termination {
    /// Exited after SIGTERM within the timeout.
    Exited(ExitStatus),
    /// Had already exited before the signal was sent.
    AlreadyExited(ExitStatus),
    /// Still alive when the timeout elapsed; no escalation configured.
    TimedOut,
    /// Killed with SIGKILL after the timeout elapsed.
    Killed(ExitStatus),
}

/// Handle to one supervised job process.
///
/// Cheap to clone; clones refer to the same process. Two handles are the
/// same entry iff [`ProcessHandle::same_process`] holds.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<Inner>,
}

struct Inner {
    job_uid: JobUid,
    pid: Option<u32>,
    started_at: Timestamp,
    descriptor: JobDescriptor,
    child: Mutex<Child>,
}

impl ProcessHandle {
    /// Wrap a freshly spawned child. The start time is taken here, in the
    /// parent, right after the spawn returned.
    pub(crate) fn new(job_uid: JobUid, child: Child, descriptor: JobDescriptor) -> Self {
        Self {
            inner: Arc::new(Inner {
                job_uid,
                pid: child.id(),
                started_at: Utc::now(),
                descriptor,
                child: Mutex::new(child),
            }),
        }
    }

    pub fn job_uid(&self) -> &str {
        &self.inner.job_uid
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    pub fn started_at(&self) -> Timestamp {
        self.inner.started_at
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            job_uid: self.inner.job_uid.clone(),
            pid: self.inner.pid,
            start_time: self.inner.started_at,
            job: self.inner.descriptor.clone(),
        }
    }

    pub fn same_process(&self, other: &ProcessHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Non-blocking liveness check (`waitpid` with `WNOHANG`).
    ///
    /// Never waits for the child lock: if a stop currently owns the child
    /// the probe reports [`Liveness::Busy`].
    pub(crate) fn probe(&self) -> io::Result<Liveness> {
        let Ok(mut child) = self.inner.child.try_lock() else {
            return Ok(Liveness::Busy);
        };
        Ok(match child.try_wait()? {
            Some(status) => Liveness::Exited(status),
            None => Liveness::Running,
        })
    }

    /// Send SIGTERM and wait up to `timeout` for the process to exit.
    ///
    /// With `escalate`, a process still alive after the timeout is killed.
    pub(crate) async fn terminate(
        &self,
        timeout: Duration,
        escalate: bool,
    ) -> io::Result<Termination> {
        let mut child = self.inner.child.lock().await;

        // A reaped pid may already belong to another process; never signal it.
        if let Some(status) = child.try_wait()? {
            return Ok(Termination::AlreadyExited(status));
        }

        send_terminate(&mut child)?;

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => Ok(Termination::Exited(status?)),
            Err(_elapsed) if escalate => {
                child.start_kill()?;
                match tokio::time::timeout(timeout, child.wait()).await {
                    Ok(status) => Ok(Termination::Killed(status?)),
                    Err(_elapsed) => Ok(Termination::TimedOut),
                }
            }
            Err(_elapsed) => Ok(Termination::TimedOut),
        }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("job_uid", &self.inner.job_uid)
            .field("pid", &self.inner.pid)
            .field("started_at", &self.inner.started_at)
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    let pid = child
        .id()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "process already reaped"))?;
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // Safety: kill(2) takes plain integers and has no memory effects.
    let ret = unsafe { libc::kill(pid, libc::SIGTERM) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
