//! Command gateway: the HTTP control plane.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/simulate/failure` | Inject a failure and broadcast it |
//! | `GET` | `/health` | Static liveness payload |
//! | `GET` | `/status` | Viewer count, broadcast total, uptime |
//! | `GET` | `/metrics` | Prometheus text exposition |
//!
//! Every path except `/metrics` is also served under `/api`.
//!
//! Failure injections are pass-through unless validation is enabled: the
//! `type` and `kitchenId` values reach viewers exactly as posted.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use dfs_types::FailureEvent;
use metrics::counter;
use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use crate::error::RelayError;
use crate::state::AppState;
use crate::telemetry;

/// Acknowledgement text returned for every accepted injection.
pub const FAILURE_INJECTED_ACK: &str = "Failure Injected";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /simulate/failure` when validation is enabled.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FailureRequest {
    /// Failure kind, e.g. `OVEN_BREAKDOWN`.
    #[serde(rename = "type")]
    #[validate(
        required(message = "type is required"),
        length(min = 1, message = "type must not be empty")
    )]
    pub failure_type: Option<String>,
    /// Target kitchen, e.g. `KITCHEN-A`.
    #[validate(
        required(message = "kitchenId is required"),
        length(min = 1, message = "kitchenId must not be empty")
    )]
    pub kitchen_id: Option<String>,
}

impl FailureRequest {
    /// Parse the body and require a non-empty `type` and `kitchenId`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] if the body is not a JSON
    /// object of the right shape or either field is missing or empty.
    pub fn strict(body: &[u8]) -> Result<Self, RelayError> {
        let request: Self = serde_json::from_slice(body)
            .map_err(|e| RelayError::InvalidRequest(format!("malformed body: {e}")))?;
        request
            .validate()
            .map_err(|e| RelayError::InvalidRequest(e.to_string()))?;
        Ok(request)
    }
}

impl From<FailureRequest> for FailureEvent {
    fn from(request: FailureRequest) -> Self {
        Self::new(
            request.failure_type.map(Value::String),
            request.kitchen_id.map(Value::String),
        )
    }
}

/// Request body for `POST /simulate/failure` in pass-through mode.
///
/// Fields are whatever JSON values arrived under `type` and `kitchenId`,
/// `null` included.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PassThroughRequest {
    /// Value of `type`, if present.
    pub failure_type: Option<Value>,
    /// Value of `kitchenId`, if present.
    pub kitchen_id: Option<Value>,
}

impl PassThroughRequest {
    /// Take `type` and `kitchenId` from the body as they are.
    ///
    /// A body that is not a JSON object counts as an empty request.
    pub fn parse(body: &[u8]) -> Self {
        let Ok(Value::Object(mut fields)) = serde_json::from_slice::<Value>(body) else {
            return Self::default();
        };
        Self {
            failure_type: fields.remove("type"),
            kitchen_id: fields.remove("kitchenId"),
        }
    }
}

impl From<PassThroughRequest> for FailureEvent {
    fn from(request: PassThroughRequest) -> Self {
        Self::new(request.failure_type, request.kitchen_id)
    }
}

/// Response body for `POST /simulate/failure`.
#[derive(Debug, serde::Serialize)]
pub struct FailureAck {
    /// Always [`FAILURE_INJECTED_ACK`].
    pub status: &'static str,
}

/// Response body for `GET /health`.
#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    /// Always `"UP"`.
    pub status: &'static str,
    /// Configured service name.
    pub service: String,
}

/// Response body for `GET /status`.
#[derive(Debug, serde::Serialize)]
pub struct StatusResponse {
    /// Configured service name.
    pub service: String,
    /// Viewers currently connected.
    pub viewers: usize,
    /// Events fanned out since startup.
    pub events_broadcast: u64,
    /// Process start time (RFC 3339).
    pub started_at: String,
    /// Whole seconds since startup.
    pub uptime_seconds: u64,
}

// ---------------------------------------------------------------------------
// POST /simulate/failure
// ---------------------------------------------------------------------------

/// Inject a simulated failure and broadcast it to every viewer.
///
/// The body is forwarded as-is unless validation is enabled, in which
/// case an incomplete request gets a `400` and nothing is broadcast.
/// The acknowledgement does not depend on how many viewers received the
/// event.
pub async fn inject_failure(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RelayError> {
    let event: FailureEvent = if state.validate_failure_requests {
        FailureRequest::strict(&body)?.into()
    } else {
        PassThroughRequest::parse(&body).into()
    };

    warn!(
        failure_type = event.failure_type.as_ref().map(tracing::field::display),
        kitchen_id = event.kitchen_id.as_ref().map(tracing::field::display),
        "Injecting failure"
    );

    counter!(telemetry::FAILURES_INJECTED).increment(1);
    let delivered = state.hub.deliver(event.into()).await?;
    info!(viewers = delivered, "Failure broadcast");

    Ok(Json(FailureAck {
        status: FAILURE_INJECTED_ACK,
    }))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Static liveness payload. Never touches the hub.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        service: state.service_name.clone(),
    })
}

// ---------------------------------------------------------------------------
// GET /status
// ---------------------------------------------------------------------------

/// Operator view of the relay: connected viewers and broadcast totals.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let started_at: DateTime<Utc> = state.started_at.into();
    Json(StatusResponse {
        service: state.service_name.clone(),
        viewers: state.hub.viewer_count().await,
        events_broadcast: state.hub.events_broadcast(),
        started_at: started_at.to_rfc3339(),
        uptime_seconds: state.started().elapsed().as_secs(),
    })
}

// ---------------------------------------------------------------------------
// GET /metrics
// ---------------------------------------------------------------------------

/// Prometheus scrape endpoint.
///
/// Renders the installed recorder, or an empty exposition when none is
/// attached.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    telemetry::record_process_metrics(&state.process);
    let body = state
        .metrics
        .as_ref()
        .map(metrics_exporter_prometheus::PrometheusHandle::render)
        .unwrap_or_default();
    ([(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], body)
}
