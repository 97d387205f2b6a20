//! Axum router construction for the relay.
//!
//! Assembles the gateway routes and the viewer `WebSocket` into a single
//! [`Router`] with CORS driven by the configured origin policy.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::gateway;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the relay.
///
/// The router includes:
/// - `POST /simulate/failure` -- inject a failure
/// - `GET /health` -- liveness
/// - `GET /status` -- hub status
/// - `GET /ws` -- viewer `WebSocket`
/// - `GET /metrics` -- Prometheus scrape endpoint
///
/// All but `/metrics` are mounted both at the root and under `/api`,
/// which is where the dashboard frontend looks for them.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = state.origins.cors_layer();

    let api: Router<Arc<AppState>> = Router::new()
        .route("/simulate/failure", post(gateway::inject_failure))
        .route("/health", get(gateway::health))
        .route("/status", get(gateway::status))
        .route("/ws", get(ws::ws_viewer));

    Router::new()
        .route("/metrics", get(gateway::metrics))
        .merge(api.clone())
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
