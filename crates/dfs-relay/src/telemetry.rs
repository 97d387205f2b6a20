//! Metric names and helpers for the Prometheus scrape endpoint.
//!
//! Call sites record through the `metrics` facade. The binary installs a
//! Prometheus recorder and stores its handle in [`AppState`]; the
//! `/metrics` handler renders that handle. With no recorder installed the
//! macros are no-ops.
//!
//! Process metrics (CPU seconds, resident and virtual memory, open file
//! descriptors, threads, start time) come from [`metrics_process`] and are
//! sampled on each scrape.
//!
//! [`AppState`]: crate::state::AppState

use dfs_types::{HubEvent, names};
use metrics::{describe_counter, describe_gauge};
use metrics_process::Collector;

/// Resident memory of the process, from the process collector.
pub const PROCESS_RESIDENT_MEMORY: &str = "process_resident_memory_bytes";
/// Unix time the process started, from the process collector.
pub const PROCESS_START_TIME: &str = "process_start_time_seconds";
/// Viewers currently connected to the hub.
pub const VIEWERS_CONNECTED: &str = "dfs_viewers_connected";
/// Viewer connections accepted.
pub const VIEWER_CONNECTIONS: &str = "dfs_viewer_connections_total";
/// Viewer connections closed.
pub const VIEWER_DISCONNECTIONS: &str = "dfs_viewer_disconnections_total";
/// Events fanned out by the hub, labelled by event name.
pub const EVENTS_BROADCAST: &str = "dfs_events_broadcast_total";
/// Frames dropped because a viewer queue was full.
pub const FRAMES_DROPPED: &str = "dfs_frames_dropped_total";
/// Inbound viewer frames that could not be decoded.
pub const INVALID_FRAMES: &str = "dfs_invalid_frames_total";
/// Failures injected through the command gateway.
pub const FAILURES_INJECTED: &str = "dfs_failures_injected_total";

/// Register help text for every metric. Call once after installing the
/// recorder.
pub fn describe_metrics() {
    Collector::default().describe();
    describe_gauge!(VIEWERS_CONNECTED, "Viewers currently connected to the broadcast hub.");
    describe_counter!(VIEWER_CONNECTIONS, "Viewer connections accepted.");
    describe_counter!(VIEWER_DISCONNECTIONS, "Viewer connections closed.");
    describe_counter!(EVENTS_BROADCAST, "Events fanned out by the broadcast hub.");
    describe_counter!(FRAMES_DROPPED, "Frames dropped for viewers with a full queue.");
    describe_counter!(INVALID_FRAMES, "Inbound viewer frames that failed to decode.");
    describe_counter!(FAILURES_INJECTED, "Failures injected through the command gateway.");
}

/// Sample the process metrics. Called on every scrape.
pub fn record_process_metrics(collector: &Collector) {
    collector.collect();
}

/// Label value for [`EVENTS_BROADCAST`].
///
/// Opaque event names come from viewers, so they share one label to keep
/// the series count bounded.
pub fn event_label(event: &HubEvent) -> &'static str {
    match event {
        HubEvent::FailureInjected(_) => names::FAILURE_INJECTED,
        HubEvent::OrderAccepted(_) => names::ORDER_ACCEPTED,
        HubEvent::NewOrder(_) => names::NEW_ORDER,
        HubEvent::Opaque { .. } => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use dfs_types::{FailureEvent, OrderPayload};
    use serde_json::json;

    use super::*;

    #[test]
    fn opaque_events_share_one_label() {
        let a = HubEvent::Opaque {
            event: "A".to_owned(),
            data: json!(null),
        };
        let b = HubEvent::Opaque {
            event: "B".to_owned(),
            data: json!(null),
        };
        assert_eq!(event_label(&a), event_label(&b));
    }

    #[test]
    fn known_events_use_their_names() {
        assert_eq!(
            event_label(&HubEvent::FailureInjected(FailureEvent::new(None, None))),
            "FAILURE_INJECTED"
        );
        assert_eq!(
            event_label(&HubEvent::NewOrder(OrderPayload(json!({})))),
            "NEW_ORDER"
        );
    }
}
