//! Built-in job targets.
//!
//! Domain workloads are registered by the deployment; these targets cover
//! the operational basics (smoke tests, timed placeholders, arbitrary shell
//! scripts).

use std::process::Command;
use std::time::Duration;

use serde_json::Value;

use super::registry::{JobError, JobRegistry};
use crate::job::JobArgs;

/// Logs its arguments and succeeds.
pub const TARGET_ECHO: &str = "builtin.echo";

/// Sleeps for `seconds` (keyword or first positional argument).
pub const TARGET_SLEEP: &str = "builtin.sleep";

/// Exits with `code` (keyword or first positional argument, default 1).
pub const TARGET_FAIL: &str = "builtin.fail";

/// Runs `bash <script>` and propagates its exit code.
pub const TARGET_SHELL: &str = "builtin.shell";

/// Register every built-in target.
pub fn register_all(registry: &mut JobRegistry) {
    registry
        .register(TARGET_ECHO, echo)
        .register(TARGET_SLEEP, sleep)
        .register(TARGET_FAIL, fail)
        .register(TARGET_SHELL, shell);
}

fn echo(args: &JobArgs) -> Result<(), JobError> {
    tracing::info!(args = ?args.args, kwargs = ?args.kwargs, "echo job");
    Ok(())
}

fn sleep(args: &JobArgs) -> Result<(), JobError> {
    let seconds = args
        .get("seconds", 0)
        .and_then(Value::as_f64)
        .ok_or_else(|| JobError::InvalidArguments("`seconds` must be a number".into()))?;

    let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
        JobError::InvalidArguments(format!("`seconds` out of range: {seconds}"))
    })?;

    tracing::info!(seconds, "sleep job started");
    std::thread::sleep(duration);
    Ok(())
}

fn fail(args: &JobArgs) -> Result<(), JobError> {
    let code = match args.get("code", 0) {
        None => 1,
        Some(value) => value
            .as_i64()
            .and_then(|c| i32::try_from(c).ok())
            .ok_or_else(|| JobError::InvalidArguments("`code` must be an integer".into()))?,
    };
    Err(JobError::Exit(code))
}

fn shell(args: &JobArgs) -> Result<(), JobError> {
    let script = args
        .get("script", 0)
        .and_then(Value::as_str)
        .ok_or_else(|| JobError::InvalidArguments("`script` must be a path".into()))?;

    let mut cmd = Command::new("bash");
    cmd.arg(script);

    if let Some(env) = args.kwargs.get("env") {
        let env = env
            .as_object()
            .ok_or_else(|| JobError::InvalidArguments("`env` must be an object".into()))?;
        for (key, value) in env {
            match value {
                Value::String(s) => cmd.env(key, s),
                other => cmd.env(key, other.to_string()),
            };
        }
    }

    if let Some(dir) = args.kwargs.get("working_directory").and_then(Value::as_str) {
        cmd.current_dir(dir);
    }

    tracing::info!(script, "shell job started");
    let status = cmd.status()?;

    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(JobError::Exit(code)),
        None => Err(JobError::Failed(format!("`{script}` terminated by signal"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
