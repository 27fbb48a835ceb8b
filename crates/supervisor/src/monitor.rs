//! Background reaper for finished job processes.
//!
//! Each cycle copies the registered job UIDs, re-checks every UID under the
//! registry lock, probes the process outside it, and for dead processes
//! removes the entry and fires the completion callback on a detached task.
//! A failure while handling one job is logged and the cycle moves on.

use std::sync::Weak;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::handle::Liveness;
use crate::supervisor::Supervisor;

/// Run the monitor loop until `cancel` fires or the supervisor is dropped.
pub(crate) async fn run(supervisor: Weak<Supervisor>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(
        interval_ms = interval.as_millis() as u64,
        "Process monitor started",
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Process monitor shutting down");
                break;
            }
            _ = ticker.tick() => {
                let Some(supervisor) = supervisor.upgrade() else {
                    tracing::info!("Supervisor dropped, process monitor exiting");
                    break;
                };
                let reaped = supervisor.reap_finished();
                if reaped > 0 {
                    tracing::debug!(reaped, "Monitor cycle reaped finished jobs");
                }
            }
        }
    }
}

impl Supervisor {
    /// Run one monitor cycle. Returns how many finished jobs were reaped.
    pub fn reap_finished(&self) -> usize {
        let mut reaped = 0;

        for job_uid in self.registry().job_uids() {
            // A concurrent stop may have claimed the job since the copy.
            let Some(handle) = self.registry().lookup(&job_uid) else {
                continue;
            };

            let status = match handle.probe() {
                Ok(Liveness::Exited(status)) => status,
                Ok(Liveness::Running | Liveness::Busy) => continue,
                Err(e) => {
                    tracing::error!(job_uid = %job_uid, error = %e, "Failed to probe job process");
                    continue;
                }
            };

            if !self.registry().unregister_if(&job_uid, &handle) {
                tracing::debug!(job_uid = %job_uid, "Job claimed by a concurrent stop");
                continue;
            }

            let success = status.code() == Some(0);
            tracing::info!(
                job_uid = %job_uid,
                pid = ?handle.pid(),
                exit_code = ?status.code(),
                success,
                "Job process finished, removed from registry",
            );

            let notifier = self.notifier();
            tokio::spawn(async move {
                notifier.notify(&job_uid, success).await;
            });
            reaped += 1;
        }

        reaped
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
