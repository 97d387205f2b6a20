//! Real-time event relay for the DFS operations dashboard.
//!
//! This crate provides an Axum HTTP server with two parts:
//!
//! - **Command gateway**: REST endpoints that inject simulated failures,
//!   report liveness and status, and expose Prometheus metrics
//! - **Broadcast hub**: the set of connected dashboard viewers
//!   (`GET /ws`). Every event, whether injected through the gateway or
//!   sent by a viewer, is fanned out to all viewers.
//!
//! # Architecture
//!
//! The [`Hub`] is the only shared mutable state. It owns the viewer set
//! and gives each viewer a bounded queue, so a slow or vanished viewer
//! never holds up the others. Delivery is best-effort: nothing is
//! stored, retried, or replayed to viewers that connect later.
//!
//! [`Hub`]: hub::Hub

pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod origin;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod telemetry;
pub mod ws;

// Re-export primary types for convenience.
pub use config::{ConfigError, DashboardConfig};
pub use hub::{Hub, Viewer};
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use startup::{RelayHandle, StartupError, spawn_relay};
pub use state::AppState;
