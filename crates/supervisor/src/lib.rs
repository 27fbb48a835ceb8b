//! Job process supervisor.
//!
//! [`Supervisor`] launches jobs as OS child processes, keeps at most one
//! process per job UID in a [`ProcessRegistry`], stops them on request, and
//! runs a background monitor that reaps finished processes and reports
//! their outcome through a [`CompletionNotifier`].

pub mod error;
pub mod handle;
pub mod launcher;
pub mod monitor;
pub mod notifier;
pub mod registry;
pub mod supervisor;

pub use error::SupervisorError;
pub use handle::{JobState, ProcessHandle, ProcessInfo, ProcessStatus};
pub use launcher::{Launched, Launcher, WorkerLauncher};
pub use notifier::{CompletionNotifier, HttpNotifier};
pub use registry::ProcessRegistry;
pub use supervisor::{JobStatusReport, Supervisor, SupervisorConfig};

#[cfg(test)]
pub(crate) mod test_helpers;
