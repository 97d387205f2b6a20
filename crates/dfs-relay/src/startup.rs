//! Relay startup helper for embedding and tests.
//!
//! [`spawn_relay`] binds eagerly, so a bad address or busy port is
//! reported to the caller instead of inside a background task, then runs
//! the server on its own Tokio task.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dfs_relay::config::ServerConfig;
//! use dfs_relay::startup::spawn_relay;
//! use dfs_relay::state::AppState;
//! use std::sync::Arc;
//!
//! let config = ServerConfig { host: "127.0.0.1".into(), port: 0, ..ServerConfig::default() };
//! let relay = spawn_relay(&config, Arc::new(AppState::default())).await?;
//! println!("listening on {}", relay.local_addr());
//! relay.shutdown().await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::server::{self, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning or stopping the relay.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or exited with an error.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// The server task panicked or was aborted.
    #[error("server task failed: {0}")]
    Join(String),
}

/// A relay running on a background task.
#[derive(Debug)]
pub struct RelayHandle {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl RelayHandle {
    /// The address the relay is actually listening on. Useful when the
    /// configured port was `0`.
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Ask the relay to shut down and wait for it to stop.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the server exited with an error or its
    /// task failed.
    pub async fn shutdown(self) -> Result<(), StartupError> {
        // The receiver is gone only if the server already stopped.
        if self.shutdown_tx.send(()).is_err() {
            tracing::debug!("Relay already stopped before shutdown was requested");
        }
        self.task
            .await
            .map_err(|e| StartupError::Join(e.to_string()))??;
        Ok(())
    }
}

/// Bind `config` and serve the relay on a background task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address cannot be bound.
pub async fn spawn_relay(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<RelayHandle, StartupError> {
    let listener = server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no local address: {e}")))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server::serve(listener, state, async move {
        // A dropped sender also counts as a shutdown request.
        let _ = shutdown_rx.await;
    }));

    tracing::info!(%addr, "Relay spawned on background task");

    Ok(RelayHandle {
        addr,
        shutdown_tx,
        task,
    })
}
