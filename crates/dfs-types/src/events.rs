//! Events relayed between the command gateway, the broadcast hub, and
//! connected viewers.
//!
//! [`HubEvent`] is the tagged union the hub fans out. Known event kinds get
//! their own variant; anything else travels as [`HubEvent::Opaque`] with its
//! name and payload untouched.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use ts_rs::TS;

use crate::frame::{Frame, FrameError};

/// Event names used on the real-time channel.
pub mod names {
    /// Server to viewers: a failure was injected through the gateway.
    pub const FAILURE_INJECTED: &str = "FAILURE_INJECTED";
    /// Viewer to hub: an order was accepted upstream.
    pub const ORDER_ACCEPTED: &str = "ORDER_ACCEPTED";
    /// Hub to viewers: rebroadcast of an `ORDER_ACCEPTED` payload.
    pub const NEW_ORDER: &str = "NEW_ORDER";
}

// ---------------------------------------------------------------------------
// FailureEvent
// ---------------------------------------------------------------------------

/// A simulated failure, created by the gateway when an operator injects one.
///
/// Both descriptive fields are passed through exactly as received, whatever
/// their JSON type. A field missing from the request is omitted from the
/// serialized event rather than replaced with a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct FailureEvent {
    /// Failure kind, e.g. `OVEN_BREAKDOWN`.
    #[serde(rename = "type")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub failure_type: Option<Value>,
    /// Kitchen the failure applies to, e.g. `KITCHEN-A`.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub kitchen_id: Option<Value>,
    /// Server time at which the event was created. Serialized as RFC 3339
    /// with millisecond precision.
    #[serde(serialize_with = "serialize_millis")]
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
}

impl FailureEvent {
    /// Create a failure event stamped with the current time.
    pub fn new(failure_type: Option<Value>, kitchen_id: Option<Value>) -> Self {
        Self::at(failure_type, kitchen_id, Utc::now())
    }

    /// Create a failure event with an explicit timestamp.
    pub const fn at(
        failure_type: Option<Value>,
        kitchen_id: Option<Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            failure_type,
            kitchen_id,
            timestamp,
        }
    }
}

fn serialize_millis<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// ---------------------------------------------------------------------------
// OrderPayload
// ---------------------------------------------------------------------------

/// Opaque order notification, e.g. `{ "orderId": .., "storeId": .. }`.
///
/// The hub never inspects or rewrites the inner value; the accessors exist
/// only so the relay can log something meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderPayload(pub Value);

impl OrderPayload {
    /// The `orderId` field, if present and a string.
    pub fn order_id(&self) -> Option<&str> {
        self.0.get("orderId").and_then(Value::as_str)
    }

    /// The `storeId` field, if present and a string.
    pub fn store_id(&self) -> Option<&str> {
        self.0.get("storeId").and_then(Value::as_str)
    }

    /// Borrow the raw payload.
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// HubEvent
// ---------------------------------------------------------------------------

/// Every event the broadcast hub can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// A failure injected through the command gateway.
    FailureInjected(FailureEvent),
    /// An order acceptance reported by a viewer.
    OrderAccepted(OrderPayload),
    /// An accepted order, as rebroadcast to all viewers.
    NewOrder(OrderPayload),
    /// Any other named event. Kept verbatim for forward compatibility.
    Opaque {
        /// Event name as received.
        event: String,
        /// Payload as received.
        data: Value,
    },
}

impl HubEvent {
    /// Name of this event on the real-time channel.
    pub fn name(&self) -> &str {
        match self {
            Self::FailureInjected(_) => names::FAILURE_INJECTED,
            Self::OrderAccepted(_) => names::ORDER_ACCEPTED,
            Self::NewOrder(_) => names::NEW_ORDER,
            Self::Opaque { event, .. } => event,
        }
    }

    /// Decode an inbound viewer frame.
    ///
    /// Only the order events are lifted into typed variants. A
    /// `FAILURE_INJECTED` frame sent by a viewer stays opaque so its
    /// payload is relayed exactly as sent instead of being re-encoded.
    pub fn from_frame(frame: Frame) -> Self {
        let Frame { event, data } = frame;
        match event.as_str() {
            names::ORDER_ACCEPTED => Self::OrderAccepted(OrderPayload(data)),
            names::NEW_ORDER => Self::NewOrder(OrderPayload(data)),
            _ => Self::Opaque { event, data },
        }
    }

    /// The event a viewer-originated event becomes when the hub relays it.
    ///
    /// `ORDER_ACCEPTED` is re-emitted as `NEW_ORDER` with the same payload.
    /// Every other event keeps its name.
    pub fn into_relayed(self) -> Self {
        match self {
            Self::OrderAccepted(payload) => Self::NewOrder(payload),
            other => other,
        }
    }

    /// Encode this event as a wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Json`] if the payload cannot be serialized.
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let data = match self {
            Self::FailureInjected(failure) => serde_json::to_value(failure)?,
            Self::OrderAccepted(payload) | Self::NewOrder(payload) => payload.0.clone(),
            Self::Opaque { data, .. } => data.clone(),
        };
        Ok(Frame {
            event: self.name().to_owned(),
            data,
        })
    }
}

impl From<FailureEvent> for HubEvent {
    fn from(event: FailureEvent) -> Self {
        Self::FailureInjected(event)
    }
}
