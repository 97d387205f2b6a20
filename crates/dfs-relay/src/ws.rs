//! `WebSocket` handler for dashboard viewers.
//!
//! Viewers connect to `GET /ws`, are added to the [`Hub`], and from then
//! on receive every broadcast frame. Text frames sent by a viewer are
//! decoded and relayed to all viewers, the sender included.
//!
//! A viewer is removed from the hub as soon as its connection ends,
//! whether the peer closed, the transport failed, or the server is
//! shutting down.
//!
//! [`Hub`]: crate::hub::Hub

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::ORIGIN;
use axum::response::{IntoResponse, Response};
use dfs_types::{Frame, ViewerId};
use metrics::counter;
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::state::AppState;
use crate::telemetry;

/// Upgrade an HTTP request to a viewer connection.
///
/// # Route
///
/// `GET /ws`
///
/// Rejects the upgrade with `403` if the `Origin` header is not allowed.
pub async fn ws_viewer(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, RelayError> {
    let origin = headers.get(ORIGIN);
    if !state.origins.allows(origin) {
        let origin = origin
            .and_then(|o| o.to_str().ok())
            .unwrap_or("<non-ascii>")
            .to_owned();
        warn!(origin = %origin, "Rejected viewer from disallowed origin");
        return Err(RelayError::ForbiddenOrigin(origin));
    }
    Ok(ws
        .on_upgrade(move |socket| handle_viewer(socket, state))
        .into_response())
}

/// Handle one viewer for its whole lifetime: forward queued frames out,
/// relay inbound frames through the hub, then unregister.
async fn handle_viewer(mut socket: WebSocket, state: Arc<AppState>) {
    let mut viewer = state.hub.add().await;
    let id = viewer.id();

    loop {
        tokio::select! {
            // A frame queued for this viewer by the hub.
            frame = viewer.next_frame() => {
                let Some(frame) = frame else {
                    debug!(viewer = %id, "Hub released viewer, closing socket");
                    if socket.send(Message::Close(None)).await.is_err() {
                        debug!(viewer = %id, "Close frame not delivered");
                    }
                    break;
                };
                if socket.send(Message::Text(String::from(&*frame).into())).await.is_err() {
                    debug!(viewer = %id, "Viewer disconnected (send failed)");
                    break;
                }
            }
            // Something from the viewer.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        relay_inbound(&state, id, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(viewer = %id, "Viewer closed the connection");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(viewer = %id, "WebSocket error: {e}");
                        break;
                    }
                    _ => {
                        // Binary frames carry nothing for the hub. Pings are answered
                        // by the protocol layer.
                    }
                }
            }
        }
    }

    state.hub.remove(id).await;
}

/// Decode a text frame from a viewer and relay it.
///
/// Undecodable frames are logged and dropped; the connection stays open.
async fn relay_inbound(state: &AppState, id: ViewerId, text: &str) {
    let frame = match Frame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            counter!(telemetry::INVALID_FRAMES).increment(1);
            debug!(viewer = %id, "Ignoring undecodable frame: {e}");
            return;
        }
    };

    if let Err(e) = state.hub.receive(id, frame).await {
        warn!(viewer = %id, "Failed to relay viewer frame: {e}");
    }
}
