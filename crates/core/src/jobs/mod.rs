//! Job invocation boundary.
//!
//! Job functions are registered by name at startup in a [`JobRegistry`].
//! The supervisor never calls them directly: it spawns the service binary
//! in `run-job` mode, and [`runner::run`] resolves the target inside that
//! child process and invokes it with the decoded arguments.

pub mod builtin;
pub mod registry;
pub mod runner;

pub use registry::{JobError, JobFn, JobRegistry};
