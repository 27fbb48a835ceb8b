//! Name → function registry for job targets.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::job::JobArgs;

/// A registered job function.
pub type JobFn = Arc<dyn Fn(&JobArgs) -> Result<(), JobError> + Send + Sync>;

/// Failure reported by a job function.
///
/// The runner turns this into the child's exit status, which is all the
/// supervisor ever observes.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The job asked to exit with a specific code.
    #[error("Job exited with code {0}")]
    Exit(i32),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job failed: {0}")]
    Failed(String),
}

impl JobError {
    /// Process exit code the runner reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit(code) => *code,
            _ => 1,
        }
    }
}

/// Statically populated set of invocable job targets.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, JobFn>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `builtin.*` targets.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        super::builtin::register_all(&mut registry);
        registry
    }

    /// Register `job` under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: impl Into<String>, job: F) -> &mut Self
    where
        F: Fn(&JobArgs) -> Result<(), JobError> + Send + Sync + 'static,
    {
        self.jobs.insert(name.into(), Arc::new(job));
        self
    }

    pub fn resolve(&self, name: &str) -> Option<JobFn> {
        self.jobs.get(name).cloned()
    }

    /// Registered target names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("targets", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
