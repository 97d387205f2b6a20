//! Error types for the dashboard binary.
//!
//! [`DashboardError`] is the top-level error type that wraps every
//! failure mode during startup and serving.

/// Top-level error for the dashboard binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: dfs_relay::ConfigError,
    },

    /// The Prometheus recorder could not be installed.
    #[error("metrics error: {message}")]
    Metrics {
        /// Description of the recorder failure.
        message: String,
    },

    /// The relay server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: dfs_relay::ServerError,
    },
}
