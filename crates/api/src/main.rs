use std::ffi::OsStr;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use operator_core::jobs::runner::{self, EXIT_INVALID_INVOCATION, RUN_JOB_COMMAND};
use operator_core::jobs::JobRegistry;
use operator_supervisor::{HttpNotifier, Supervisor, WorkerLauncher};

use operator_api::config::ServerConfig;
use operator_api::router::build_app_router;
use operator_api::state::AppState;
use operator_api::telemetry::{self, DEFAULT_LOG_FILTER};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args_os().skip(1);
    if args.next().as_deref() == Some(OsStr::new(RUN_JOB_COMMAND)) {
        std::process::exit(run_job(args.next()));
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build the tokio runtime")?
        .block_on(run_server())
}

/// Child mode: `operator-api run-job <target>` with the payload on stdin.
fn run_job(target: Option<std::ffi::OsString>) -> i32 {
    telemetry::init_tracing(DEFAULT_LOG_FILTER).ok();

    let Some(target) = target.and_then(|t| t.into_string().ok()) else {
        tracing::error!("run-job requires a UTF-8 target name");
        return EXIT_INVALID_INVOCATION;
    };

    let registry = JobRegistry::with_builtins();
    runner::run(&registry, &target, std::io::stdin().lock())
}

async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    telemetry::init_tracing(DEFAULT_LOG_FILTER).context("Failed to install tracing subscriber")?;

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(
        app_name = %config.app_name,
        host = %config.host,
        port = config.port,
        scheduler = %config.scheduler_base_url(),
        "Loaded server configuration",
    );

    // --- Supervisor ---
    let registry = JobRegistry::with_builtins();
    let launcher = WorkerLauncher::for_current_exe()
        .context("Failed to resolve the service executable")?
        .known_targets(registry.names());
    tracing::info!(targets = ?registry.names(), "Job targets registered");

    let notifier = HttpNotifier::new(&config.scheduler_base_url(), config.callback_timeout())
        .context("Failed to build the completion notifier")?;

    let supervisor = Arc::new(Supervisor::new(
        Arc::new(launcher),
        Arc::new(notifier),
        config.supervisor_config(),
    ));
    supervisor.initialize();

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        supervisor: Arc::clone(&supervisor),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    supervisor.shutdown().await;
    tracing::info!("Graceful shutdown complete");

    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
