//! The job process supervisor.
//!
//! One [`Supervisor`] is built by the service at startup, wrapped in `Arc`,
//! and shared with every request handler. Construction has no side
//! effects; [`Supervisor::initialize`] starts the background monitor and
//! [`Supervisor::shutdown`] stops it.
//!
//! Ownership rule: whoever removes a job's registry entry owns the outcome.
//! `stop` removes the entry *before* signalling, and the monitor only
//! notifies when its own conditional removal succeeds, so an explicitly
//! stopped job is never reported as completed and no job is reported twice.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use operator_core::job::{Invocation, JobDescriptor};
use operator_core::types::{JobUid, Timestamp};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SupervisorError;
use crate::handle::{JobState, Liveness, ProcessHandle, ProcessInfo, ProcessStatus, Termination};
use crate::launcher::{self, Launched, Launcher};
use crate::monitor;
use crate::notifier::CompletionNotifier;
use crate::registry::ProcessRegistry;

/// Default monitor cycle.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Default wait for a stopped process to exit.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on joining the monitor at shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on handing a job its stdin payload.
pub const DEFAULT_PAYLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Shortest accepted monitor cycle.
pub const MIN_MONITOR_INTERVAL: Duration = Duration::from_millis(1);

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub monitor_interval: Duration,
    pub stop_timeout: Duration,
    /// SIGKILL a stopped process that outlives `stop_timeout`.
    pub escalate_kill: bool,
    pub shutdown_timeout: Duration,
    /// How long a job may take to read its payload before stdin is closed.
    pub payload_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            escalate_kill: false,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            payload_timeout: DEFAULT_PAYLOAD_TIMEOUT,
        }
    }
}

/// Status of a single job as reported to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusReport {
    pub job_uid: JobUid,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// Running monitor task.
struct MonitorTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Launches, tracks, stops, and reaps job processes.
pub struct Supervisor {
    registry: ProcessRegistry,
    launcher: Arc<dyn Launcher>,
    notifier: Arc<dyn CompletionNotifier>,
    config: SupervisorConfig,
    /// Held across lookup, spawn and register so concurrent starts of one
    /// UID spawn once. Never held across an await.
    start_gate: Mutex<()>,
    monitor: Mutex<Option<MonitorTask>>,
}

impl Supervisor {
    /// A zero `monitor_interval` is raised to [`MIN_MONITOR_INTERVAL`].
    pub fn new(
        launcher: Arc<dyn Launcher>,
        notifier: Arc<dyn CompletionNotifier>,
        mut config: SupervisorConfig,
    ) -> Self {
        if config.monitor_interval < MIN_MONITOR_INTERVAL {
            tracing::warn!(
                requested_ms = config.monitor_interval.as_millis() as u64,
                "Monitor interval too short, using the minimum",
            );
            config.monitor_interval = MIN_MONITOR_INTERVAL;
        }

        Self {
            registry: ProcessRegistry::new(),
            launcher,
            notifier,
            config,
            start_gate: Mutex::new(()),
            monitor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub(crate) fn notifier(&self) -> Arc<dyn CompletionNotifier> {
        Arc::clone(&self.notifier)
    }

    // ---- lifecycle ----

    /// Start the background monitor. Later calls are no-ops.
    pub fn initialize(self: &Arc<Self>) {
        let mut slot = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            tracing::debug!("Process monitor already running");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor::run(
            Arc::downgrade(self),
            self.config.monitor_interval,
            cancel.clone(),
        ));
        *slot = Some(MonitorTask { cancel, handle });
    }

    /// Whether [`initialize`](Self::initialize) has started the monitor.
    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop the monitor and wait (bounded) for it to exit.
    ///
    /// Job processes are left running.
    pub async fn shutdown(&self) {
        let task = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(task) = task else {
            return;
        };

        task.cancel.cancel();
        if tokio::time::timeout(self.config.shutdown_timeout, task.handle)
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "Process monitor did not stop in time",
            );
        }

        let orphaned = self.registry.len();
        if orphaned > 0 {
            tracing::warn!(orphaned, "Supervisor shut down with job processes still registered");
        }
    }

    // ---- start / stop ----

    /// Launch `invocation` as the process for `job_uid`.
    ///
    /// If `job_uid` is already registered the existing handle is returned
    /// and nothing is spawned. The new process is registered before this
    /// returns and before anything is awaited; its payload is written by a
    /// detached task. Must be called from within a Tokio runtime.
    pub fn start(
        &self,
        job_uid: &str,
        invocation: Invocation,
        descriptor: JobDescriptor,
    ) -> Result<ProcessHandle, SupervisorError> {
        let (handle, stdin, payload) = {
            let _gate = self.start_gate.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = self.registry.lookup(job_uid) {
                tracing::warn!(job_uid, pid = ?existing.pid(), "Job already running");
                return Ok(existing);
            }

            let Launched { mut child, payload } = self.launcher.launch(job_uid, &invocation)?;
            let stdin = child.stdin.take();
            let handle = ProcessHandle::new(job_uid.to_string(), child, descriptor);
            let previous = self.registry.register(handle.clone());
            debug_assert!(previous.is_none(), "registration happens under the start gate");
            (handle, stdin, payload)
        };

        tracing::info!(
            job_uid,
            pid = ?handle.pid(),
            target = %invocation.target,
            "Job process started",
        );

        if let Some(stdin) = stdin {
            let job_uid = job_uid.to_string();
            let timeout = self.config.payload_timeout;
            tokio::spawn(async move {
                launcher::write_payload(&job_uid, stdin, &payload, timeout).await;
            });
        }

        Ok(handle)
    }

    /// Stop `job_uid`, waiting up to `timeout` for the process to exit.
    ///
    /// Unknown jobs count as stopped. The registry entry is removed even if
    /// the process outlives the timeout or the signal fails; the return
    /// value only says whether the termination request itself succeeded.
    /// No completion callback is sent.
    pub async fn stop(&self, job_uid: &str, timeout: Duration) -> bool {
        let Some(handle) = self.registry.unregister(job_uid) else {
            tracing::warn!(job_uid, "Job not running");
            return true;
        };

        match handle.terminate(timeout, self.config.escalate_kill).await {
            Ok(Termination::TimedOut) => {
                tracing::warn!(
                    job_uid,
                    pid = ?handle.pid(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Job did not exit before the stop timeout; removed from registry but may still be alive",
                );
                true
            }
            Ok(outcome) => {
                tracing::info!(job_uid, pid = ?handle.pid(), ?outcome, "Job stopped");
                true
            }
            Err(e) => {
                let err = SupervisorError::TerminationFailure {
                    job_uid: job_uid.to_string(),
                    reason: e.to_string(),
                };
                tracing::error!(job_uid, pid = ?handle.pid(), error = %err, "Stop failed");
                false
            }
        }
    }

    /// Stop every registered job concurrently.
    pub async fn stop_all(&self, timeout: Duration) -> BTreeMap<JobUid, bool> {
        let job_uids = self.registry.job_uids();
        let results = futures::future::join_all(job_uids.into_iter().map(|job_uid| async move {
            let stopped = self.stop(&job_uid, timeout).await;
            (job_uid, stopped)
        }))
        .await;
        results.into_iter().collect()
    }

    // ---- queries ----

    /// Metadata of a registered job. Does not probe the process.
    pub fn process_info(&self, job_uid: &str) -> Option<ProcessInfo> {
        self.registry.lookup(job_uid).map(|h| h.info())
    }

    /// Registered *and* the OS process is alive.
    pub fn is_running(&self, job_uid: &str) -> bool {
        self.registry
            .lookup(job_uid)
            .is_some_and(|handle| Self::probe_running(&handle))
    }

    /// Snapshot of every registered job with its derived state.
    pub fn all_processes(&self) -> BTreeMap<JobUid, ProcessStatus> {
        self.registry
            .snapshot()
            .into_iter()
            .map(|(job_uid, handle)| {
                let status = if Self::probe_running(&handle) {
                    JobState::Running
                } else {
                    JobState::Stopped
                };
                let entry = ProcessStatus {
                    status,
                    pid: handle.pid(),
                    start_time: handle.started_at(),
                };
                (job_uid, entry)
            })
            .collect()
    }

    /// Status of one job, including `not_found` for unknown UIDs.
    pub fn job_status(&self, job_uid: &str) -> JobStatusReport {
        let Some(handle) = self.registry.lookup(job_uid) else {
            return JobStatusReport {
                job_uid: job_uid.to_string(),
                status: JobState::NotFound,
                pid: None,
                start_time: None,
                message: Some("Job does not exist or has already finished"),
            };
        };

        let status = if Self::probe_running(&handle) {
            JobState::Running
        } else {
            JobState::Stopped
        };
        JobStatusReport {
            job_uid: job_uid.to_string(),
            status,
            pid: handle.pid(),
            start_time: Some(handle.started_at()),
            message: None,
        }
    }

    /// Number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.registry.len()
    }

    fn probe_running(handle: &ProcessHandle) -> bool {
        match handle.probe() {
            Ok(Liveness::Running | Liveness::Busy) => true,
            Ok(Liveness::Exited(_)) => false,
            Err(e) => {
                tracing::warn!(job_uid = handle.job_uid(), error = %e, "Liveness probe failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
