use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use operator_supervisor::SupervisorConfig;

/// Configuration errors. Any of these aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running next to a local
/// scheduler. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Service name used in logs and the health payload.
    pub app_name: String,
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8088`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Bound on joining the process monitor at shutdown (default: `5`).
    pub shutdown_timeout_secs: u64,
    /// DAG scheduler host receiving completion callbacks.
    pub scheduler_host: String,
    /// DAG scheduler port (default: `9099`).
    pub scheduler_port: u16,
    /// Seconds between monitor cycles (default: `5`).
    pub monitor_interval_secs: u64,
    /// Seconds a stop waits for the process to exit (default: `5`).
    pub stop_timeout_secs: u64,
    /// SIGKILL processes that outlive the stop timeout (default: `false`).
    pub stop_escalate_kill: bool,
    /// HTTP timeout of a completion callback (default: `10`).
    pub callback_timeout_secs: u64,
    /// Seconds a job may take to read its stdin payload (default: `10`).
    pub payload_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `APP_NAME`              | `operator`               |
    /// | `HOST`                  | `0.0.0.0`                |
    /// | `PORT`                  | `8088`                   |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `5`                      |
    /// | `DAG_SCHEDULER_HOST`    | `127.0.0.1`              |
    /// | `DAG_SCHEDULER_PORT`    | `9099`                   |
    /// | `MONITOR_INTERVAL_SECS` | `5`                      |
    /// | `STOP_TIMEOUT_SECS`     | `5`                      |
    /// | `STOP_ESCALATE_KILL`    | `false`                  |
    /// | `CALLBACK_TIMEOUT_SECS` | `10`                     |
    /// | `PAYLOAD_TIMEOUT_SECS`  | `10`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let cors_origins = get("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|e| ConfigError::InvalidValue {
                    key: "CORS_ORIGINS",
                    value: origin.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            app_name: get("APP_NAME", "operator"),
            host: get("HOST", "0.0.0.0"),
            port: parse("PORT", get("PORT", "8088"))?,
            cors_origins,
            request_timeout_secs: parse("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS", "30"))?,
            shutdown_timeout_secs: parse("SHUTDOWN_TIMEOUT_SECS", get("SHUTDOWN_TIMEOUT_SECS", "5"))?,
            scheduler_host: get("DAG_SCHEDULER_HOST", "127.0.0.1"),
            scheduler_port: parse("DAG_SCHEDULER_PORT", get("DAG_SCHEDULER_PORT", "9099"))?,
            monitor_interval_secs: parse(
                "MONITOR_INTERVAL_SECS",
                get("MONITOR_INTERVAL_SECS", "5"),
            )?,
            stop_timeout_secs: parse("STOP_TIMEOUT_SECS", get("STOP_TIMEOUT_SECS", "5"))?,
            stop_escalate_kill: parse_bool(
                "STOP_ESCALATE_KILL",
                get("STOP_ESCALATE_KILL", "false"),
            )?,
            callback_timeout_secs: parse(
                "CALLBACK_TIMEOUT_SECS",
                get("CALLBACK_TIMEOUT_SECS", "10"),
            )?,
            payload_timeout_secs: parse(
                "PAYLOAD_TIMEOUT_SECS",
                get("PAYLOAD_TIMEOUT_SECS", "10"),
            )?,
        };

        if config.monitor_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MONITOR_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(config)
    }

    /// Base URL of the DAG scheduler, e.g. `http://127.0.0.1:9099`.
    pub fn scheduler_base_url(&self) -> String {
        format!("http://{}:{}", self.scheduler_host, self.scheduler_port)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            monitor_interval: Duration::from_secs(self.monitor_interval_secs),
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
            escalate_kill: self.stop_escalate_kill,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            payload_timeout: Duration::from_secs(self.payload_timeout_secs),
        }
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected a boolean".into(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
