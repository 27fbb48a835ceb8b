use std::sync::Arc;

use operator_supervisor::Supervisor;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The job process supervisor. Built once in `main`.
    pub supervisor: Arc<Supervisor>,
}
