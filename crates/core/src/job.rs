//! Job descriptors as submitted by the scheduler, and the invocation they
//! resolve to.
//!
//! The scheduler sends positional and keyword arguments as JSON-encoded
//! strings (`job_args`, `job_kwargs`). An empty or absent string means "no
//! arguments". [`JobDescriptor::invocation`] decodes both into a
//! [`JobArgs`] value that is handed to the child process unchanged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::JobUid;

/// Executor tag used when the descriptor does not name one.
pub const DEFAULT_EXECUTOR: &str = "default";

/// Caller-supplied description of a job to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_uid: JobUid,
    /// Reserved for multi-executor routing; currently informational.
    #[serde(default = "default_executor")]
    pub job_executor: String,
    /// Name of a registered job function, e.g. `builtin.sleep`.
    pub invoke_target: String,
    /// JSON array of positional arguments.
    #[serde(default)]
    pub job_args: Option<String>,
    /// JSON object of keyword arguments.
    #[serde(default)]
    pub job_kwargs: Option<String>,
}

fn default_executor() -> String {
    DEFAULT_EXECUTOR.to_string()
}

impl JobDescriptor {
    /// Validate the descriptor and decode its arguments.
    pub fn invocation(&self) -> Result<Invocation, CoreError> {
        if self.job_uid.trim().is_empty() {
            return Err(CoreError::Validation("job_uid must not be empty".into()));
        }

        let target = self.invoke_target.trim();
        if target.is_empty() {
            return Err(CoreError::Validation(
                "invoke_target must not be empty".into(),
            ));
        }

        let args = decode_json_field("job_args", self.job_args.as_deref())?;
        let kwargs = decode_json_field("job_kwargs", self.job_kwargs.as_deref())?;

        Ok(Invocation {
            target: target.to_string(),
            arguments: JobArgs { args, kwargs },
        })
    }
}

fn decode_json_field<T>(field: &str, raw: Option<&str>) -> Result<T, CoreError>
where
    T: DeserializeOwned + Default,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| CoreError::Validation(format!("{field} is not valid JSON: {e}"))),
    }
}

/// Positional and keyword arguments for a job function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobArgs {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl JobArgs {
    /// Look up an argument by keyword, falling back to a positional slot.
    pub fn get(&self, name: &str, position: usize) -> Option<&Value> {
        self.kwargs.get(name).or_else(|| self.args.get(position))
    }
}

/// A resolved request to run `target` with `arguments`.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub target: String,
    pub arguments: JobArgs,
}

/// Payload written to a job process's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub job_uid: JobUid,
    #[serde(flatten)]
    pub arguments: JobArgs,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
