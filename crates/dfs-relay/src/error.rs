//! Error types for the relay's HTTP surface.
//!
//! [`RelayError`] unifies handler failure modes into a single enum that
//! converts into an Axum response with a `{"error", "status"}` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dfs_types::FrameError;

/// Errors returned by gateway and viewer-upgrade handlers.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The request body was rejected by input validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request origin is not allowed by the configured policy.
    #[error("origin not allowed: {0}")]
    ForbiddenOrigin(String),

    /// An event could not be encoded for broadcast.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::ForbiddenOrigin(origin) => {
                (StatusCode::FORBIDDEN, format!("origin not allowed: {origin}"))
            }
            Self::Frame(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("frame error: {e}")),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
