#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use operator_supervisor::{CompletionNotifier, Supervisor, WorkerLauncher};
use tokio::sync::mpsc;
use tower::ServiceExt;

use operator_api::config::ServerConfig;
use operator_api::router::build_app_router;
use operator_api::state::AppState;

/// Build a test `ServerConfig` from the defaults.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::from_source(|_| None).expect("default config is valid");
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config
}

/// Completion notifier that records every callback instead of sending it.
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, bool)>>,
    tx: mpsc::UnboundedSender<(String, bool)>,
}

impl RecordingNotifier {
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

pub struct TestApp {
    pub router: Router,
    pub supervisor: Arc<Supervisor>,
    pub notifier: Arc<RecordingNotifier>,
    pub callbacks: mpsc::UnboundedReceiver<(String, bool)>,
}

impl TestApp {
    /// Wait for the next completion callback.
    pub async fn next_callback(&mut self) -> (String, bool) {
        tokio::time::timeout(Duration::from_secs(10), self.callbacks.recv())
            .await
            .expect("callback within timeout")
            .expect("notifier alive")
    }
}

/// Build the full application router backed by a live supervisor.
///
/// Jobs run in the real service binary (`operator-api run-job <target>`),
/// and the monitor polls every 50 ms so exits are observed quickly.
pub fn build_test_app() -> TestApp {
    let config = test_config();

    let launcher = WorkerLauncher::new(env!("CARGO_BIN_EXE_operator-api"))
        .arg("run-job")
        .known_targets(operator_core::jobs::JobRegistry::with_builtins().names());

    let (tx, callbacks) = mpsc::unbounded_channel();
    let notifier = Arc::new(RecordingNotifier {
        calls: Mutex::new(Vec::new()),
        tx,
    });

    let mut supervisor_config = config.supervisor_config();
    supervisor_config.monitor_interval = Duration::from_millis(50);
    supervisor_config.stop_timeout = Duration::from_secs(5);

    let supervisor = Arc::new(Supervisor::new(
        Arc::new(launcher),
        notifier.clone(),
        supervisor_config,
    ));
    supervisor.initialize();

    let state = AppState {
        config: Arc::new(config.clone()),
        supervisor: Arc::clone(&supervisor),
    };

    TestApp {
        router: build_app_router(state, &config),
        supervisor,
        notifier,
        callbacks,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
