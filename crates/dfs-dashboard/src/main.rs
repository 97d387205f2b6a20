//! DFS dashboard backend binary.
//!
//! Wires the relay together and serves it until the process is asked to
//! stop.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`DFS_DASHBOARD_CONFIG`, else `dfs-dashboard.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Install the Prometheus recorder
//! 4. Build shared state and serve until Ctrl-C or SIGTERM

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use dfs_relay::config::{DashboardConfig, LogFormat, LoggingConfig};
use dfs_relay::state::AppState;
use dfs_relay::telemetry;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::DashboardError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "dfs-dashboard.yaml";

/// Application entry point for the dashboard backend.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the metrics recorder
/// cannot be installed, or the server cannot bind.
#[tokio::main]
async fn main() -> Result<(), DashboardError> {
    // 1. Load configuration.
    let config_path = std::env::var("DFS_DASHBOARD_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = DashboardConfig::load_or_default(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        config = %config_path.display(),
        host = config.server.host,
        port = config.server.port,
        service = config.server.service_name,
        allowed_origins = ?config.server.allowed_origins,
        validate_failure_requests = config.gateway.validate_failure_requests,
        "dfs-dashboard starting"
    );

    // 3. Install the Prometheus recorder.
    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| DashboardError::Metrics {
            message: e.to_string(),
        })?;
    telemetry::describe_metrics();

    // 4. Serve.
    let state = Arc::new(AppState::new(&config)?.with_metrics(prometheus));
    dfs_relay::start_server(&config.server, state, shutdown_signal()).await?;

    info!("dfs-dashboard stopped");
    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
///
/// If a handler cannot be installed that source is ignored and the other
/// one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received terminate signal"),
    }
}
