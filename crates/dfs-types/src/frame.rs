//! Wire encoding for the real-time channel.
//!
//! Every message in either direction is one JSON text frame:
//!
//! ```json
//! { "event": "NEW_ORDER", "data": { "orderId": "ORD-1" } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Errors produced while decoding or encoding a [`Frame`].
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The text was not a JSON object of the expected shape.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame carried an empty event name.
    #[error("frame has an empty event name")]
    EmptyEventName,
}

/// One named event with an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Frame {
    /// Event name, e.g. `ORDER_ACCEPTED`.
    pub event: String,
    /// Event payload. Missing payloads decode as `null`.
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    /// Decode a frame from a text message.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Json`] if the text is not a frame object and
    /// [`FrameError::EmptyEventName`] if the event name is empty.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let frame: Self = serde_json::from_str(text)?;
        if frame.event.is_empty() {
            return Err(FrameError::EmptyEventName);
        }
        Ok(frame)
    }

    /// Encode this frame as a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}
