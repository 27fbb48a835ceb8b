//! Shared fixtures for supervisor unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use operator_core::job::{Invocation, JobArgs, JobDescriptor, DEFAULT_EXECUTOR};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::launcher::WorkerLauncher;
use crate::notifier::CompletionNotifier;

/// Worker script keyed on the target name (`$1`). Reads and discards the
/// payload first so the parent's stdin write never races the exit.
const WORKER_SCRIPT: &str = r#"cat >/dev/null
case "$1" in
  ok) exit 0 ;;
  fail) exit 3 ;;
  sleep) exec sleep 100 ;;
  *) exit 9 ;;
esac"#;

/// A launcher backed by `sh` that understands the `ok`, `fail`, and
/// `sleep` targets.
pub fn shell_launcher() -> WorkerLauncher {
    WorkerLauncher::new("sh").arg("-c").arg(WORKER_SCRIPT).arg("sh")
}

pub fn spawn_shell(script: &str) -> Child {
    Command::new("sh")
        .arg("-c")
        .arg(script)
        .spawn()
        .expect("spawn sh")
}

pub fn invocation(target: &str) -> Invocation {
    Invocation {
        target: target.into(),
        arguments: JobArgs::default(),
    }
}

pub fn descriptor(job_uid: &str) -> JobDescriptor {
    JobDescriptor {
        job_uid: job_uid.into(),
        job_executor: DEFAULT_EXECUTOR.into(),
        invoke_target: "ok".into(),
        job_args: None,
        job_kwargs: None,
    }
}

/// Notifier that records every callback and forwards it to a channel.
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, bool)>>,
    tx: mpsc::UnboundedSender<(String, bool)>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, bool)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                calls: Mutex::new(Vec::new()),
                tx,
            },
            rx,
        )
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionNotifier for RecordingNotifier {
    async fn notify(&self, job_uid: &str, success: bool) -> bool {
        self.calls.lock().unwrap().push((job_uid.to_string(), success));
        let _ = self.tx.send((job_uid.to_string(), success));
        true
    }
}
