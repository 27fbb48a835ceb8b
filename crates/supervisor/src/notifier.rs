//! Completion callbacks to the DAG scheduler.
//!
//! [`HttpNotifier`] POSTs `{"job_uid", "success"}` to
//! `{scheduler_base_url}/scheduler/job_completed`. Delivery is best effort:
//! one attempt, failures are logged and reported as `false`, never retried.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

/// Path of the scheduler's completion endpoint.
pub const JOB_COMPLETED_PATH: &str = "/scheduler/job_completed";

/// Default HTTP timeout for a single callback.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives the outcome of jobs that ended on their own.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    /// Report that `job_uid` finished. Returns whether delivery succeeded.
    async fn notify(&self, job_uid: &str, success: bool) -> bool;
}

/// Error type for callback delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The scheduler returned a non-2xx status code.
    #[error("Scheduler returned HTTP {0}")]
    HttpStatus(u16),
}

/// Body of the completion callback.
#[derive(Debug, Serialize)]
struct JobCompleted<'a> {
    job_uid: &'a str,
    success: bool,
}

/// Delivers completion callbacks over HTTP.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    /// Build a notifier targeting `scheduler_base_url` (e.g.
    /// `http://127.0.0.1:9099`).
    pub fn new(scheduler_base_url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!(
                "{}{JOB_COMPLETED_PATH}",
                scheduler_base_url.trim_end_matches('/')
            ),
        })
    }

    /// Full callback URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn try_send(&self, job_uid: &str, success: bool) -> Result<u16, NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&JobCompleted { job_uid, success })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::HttpStatus(status.as_u16()));
        }
        Ok(status.as_u16())
    }
}

#[async_trait]
impl CompletionNotifier for HttpNotifier {
    async fn notify(&self, job_uid: &str, success: bool) -> bool {
        match self.try_send(job_uid, success).await {
            Ok(status) => {
                tracing::info!(job_uid, success, status, "Completion callback delivered");
                true
            }
            Err(e) => {
                tracing::error!(
                    job_uid,
                    success,
                    url = %self.url,
                    error = %e,
                    "Completion callback failed",
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::sync::mpsc;

    use super::*;

    /// Start a fake scheduler that forwards received callbacks to a channel
    /// and answers with `status`.
    async fn fake_scheduler(
        status: StatusCode,
    ) -> (SocketAddr, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            JOB_COMPLETED_PATH,
            post(move |Json(body): Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, rx)
    }

    #[test]
    fn url_is_joined_without_double_slash() {
        let notifier = HttpNotifier::new("http://127.0.0.1:9099/", DEFAULT_CALLBACK_TIMEOUT).unwrap();
        assert_eq!(notifier.url(), "http://127.0.0.1:9099/scheduler/job_completed");
    }

    #[tokio::test]
    async fn delivers_job_uid_and_success() {
        let (addr, mut rx) = fake_scheduler(StatusCode::OK).await;
        let notifier = HttpNotifier::new(&format!("http://{addr}"), DEFAULT_CALLBACK_TIMEOUT).unwrap();

        assert!(notifier.notify("job-1", true).await);

        let body = rx.recv().await.expect("callback body");
        assert_eq!(body, serde_json::json!({"job_uid": "job-1", "success": true}));
    }

    #[tokio::test]
    async fn non_2xx_is_reported_as_failure() {
        let (addr, mut rx) = fake_scheduler(StatusCode::INTERNAL_SERVER_ERROR).await;
        let notifier = HttpNotifier::new(&format!("http://{addr}"), DEFAULT_CALLBACK_TIMEOUT).unwrap();

        assert!(!notifier.notify("job-2", false).await);
        // The request still arrived exactly once.
        assert_eq!(rx.recv().await.unwrap()["job_uid"], "job-2");
    }

    #[tokio::test]
    async fn unreachable_scheduler_is_swallowed() {
        // Bind then drop to get a port nothing listens on.
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let notifier = HttpNotifier::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        assert!(!notifier.notify("job-3", true).await);
    }

    #[test]
    fn notify_error_display_http_status() {
        let err = NotifyError::HttpStatus(502);
        assert_eq!(err.to_string(), "Scheduler returned HTTP 502");
    }
}
