//! The broadcast hub: the set of connected viewers and event fan-out.
//!
//! [`Hub`] owns the viewer set. Callers get a [`Viewer`] handle from
//! [`Hub::add`] and never see the collection itself.
//!
//! # Delivery
//!
//! Each viewer has its own bounded queue drained by its connection task.
//! [`Hub::broadcast`] encodes an event once and `try_send`s it to every
//! queue while holding the set lock, so it never waits on a socket and
//! all viewers see hub events in the same order. A full queue drops the
//! frame for that viewer only; a closed queue is skipped. Neither is
//! reported to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dfs_types::{Frame, FrameError, HubEvent, ViewerId};
use metrics::{counter, gauge};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::telemetry;

/// An encoded frame shared by every viewer queue it was sent to.
pub type EncodedFrame = Arc<str>;

/// Default per-viewer queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Handle for one connected viewer, returned by [`Hub::add`].
///
/// Dropping the handle does not unregister the viewer; the connection
/// task calls [`Hub::remove`] when it ends.
#[derive(Debug)]
pub struct Viewer {
    id: ViewerId,
    rx: mpsc::Receiver<EncodedFrame>,
}

impl Viewer {
    /// This viewer's identifier.
    pub const fn id(&self) -> ViewerId {
        self.id
    }

    /// Wait for the next frame queued for this viewer.
    ///
    /// Returns `None` once the hub has dropped the viewer (removal or
    /// shutdown) and the queue is drained.
    pub async fn next_frame(&mut self) -> Option<EncodedFrame> {
        self.rx.recv().await
    }
}

/// The set of connected viewers plus the fan-out primitive.
#[derive(Debug)]
pub struct Hub {
    viewers: Mutex<BTreeMap<ViewerId, mpsc::Sender<EncodedFrame>>>,
    queue_capacity: usize,
    events_broadcast: AtomicU64,
}

impl Hub {
    /// Create an empty hub. A capacity of zero is raised to one.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            viewers: Mutex::new(BTreeMap::new()),
            queue_capacity: queue_capacity.max(1),
            events_broadcast: AtomicU64::new(0),
        }
    }

    /// Register a new viewer and return its handle.
    pub async fn add(&self) -> Viewer {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = ViewerId::new();
        let count = {
            let mut viewers = self.viewers.lock().await;
            viewers.insert(id, tx);
            viewers.len()
        };

        counter!(telemetry::VIEWER_CONNECTIONS).increment(1);
        gauge!(telemetry::VIEWERS_CONNECTED).increment(1.0);
        info!(viewer = %id, viewers = count, "Viewer connected");

        Viewer { id, rx }
    }

    /// Remove a viewer. Returns `false` if it was already gone.
    pub async fn remove(&self, id: ViewerId) -> bool {
        let (removed, count) = {
            let mut viewers = self.viewers.lock().await;
            let removed = viewers.remove(&id).is_some();
            (removed, viewers.len())
        };

        if removed {
            counter!(telemetry::VIEWER_DISCONNECTIONS).increment(1);
            gauge!(telemetry::VIEWERS_CONNECTED).decrement(1.0);
            info!(viewer = %id, viewers = count, "Viewer disconnected");
        }
        removed
    }

    /// Drop every viewer. Their handles yield `None` once drained.
    pub async fn close_all(&self) {
        let closed = std::mem::take(&mut *self.viewers.lock().await);
        if closed.is_empty() {
            return;
        }
        let n = closed.len();
        counter!(telemetry::VIEWER_DISCONNECTIONS).increment(u64::try_from(n).unwrap_or(u64::MAX));
        gauge!(telemetry::VIEWERS_CONNECTED).set(0.0);
        info!(viewers = n, "Closed all viewer connections");
    }

    /// Number of connected viewers.
    pub async fn viewer_count(&self) -> usize {
        self.viewers.lock().await.len()
    }

    /// Total events fanned out since the hub was created, including
    /// events that reached no viewer.
    pub fn events_broadcast(&self) -> u64 {
        self.events_broadcast.load(Ordering::Relaxed)
    }

    /// Relay an event that arrived from a connected viewer.
    ///
    /// `ORDER_ACCEPTED` is re-emitted as `NEW_ORDER`; everything else keeps
    /// its name. The originator receives its own event back.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the event cannot be encoded.
    pub async fn receive(&self, from: ViewerId, frame: Frame) -> Result<usize, FrameError> {
        let event = HubEvent::from_frame(frame).into_relayed();
        debug!(viewer = %from, event = event.name(), "Relaying viewer event");
        self.broadcast(&event).await
    }

    /// Fan out an event produced by the command gateway.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the event cannot be encoded.
    pub async fn deliver(&self, event: HubEvent) -> Result<usize, FrameError> {
        self.broadcast(&event).await
    }

    /// Queue `event` for every connected viewer.
    ///
    /// Returns how many viewer queues accepted the frame. With no viewers
    /// this is `0` and nothing is retained.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the event cannot be encoded. No viewer
    /// receives anything in that case.
    pub async fn broadcast(&self, event: &HubEvent) -> Result<usize, FrameError> {
        let encoded: EncodedFrame = Arc::from(event.to_frame()?.encode()?);

        let mut delivered: usize = 0;
        {
            let viewers = self.viewers.lock().await;
            for (id, tx) in viewers.iter() {
                match tx.try_send(Arc::clone(&encoded)) {
                    Ok(()) => delivered = delivered.saturating_add(1),
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        counter!(telemetry::FRAMES_DROPPED).increment(1);
                        warn!(viewer = %id, event = event.name(), "Viewer queue full, dropping frame");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!(viewer = %id, "Viewer queue closed, skipping");
                    }
                }
            }
        }

        self.events_broadcast.fetch_add(1, Ordering::Relaxed);
        counter!(telemetry::EVENTS_BROADCAST, "event" => telemetry::event_label(event)).increment(1);
        debug!(event = event.name(), delivered, "Event broadcast");

        Ok(delivered)
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use dfs_types::{FailureEvent, names};
    use serde_json::{Value, json};

    use super::*;

    fn decode(frame: &EncodedFrame) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn broadcast_with_no_viewers_delivers_nothing() {
        let hub = Hub::default();
        let event = HubEvent::from(FailureEvent::new(Some(json!("X")), None));
        assert_eq!(hub.broadcast(&event).await.unwrap(), 0);
        assert_eq!(hub.events_broadcast(), 1);
    }

    #[tokio::test]
    async fn every_viewer_receives_a_delivered_event() {
        let hub = Hub::default();
        let mut a = hub.add().await;
        let mut b = hub.add().await;
        assert_eq!(hub.viewer_count().await, 2);

        let event = FailureEvent::new(Some(json!("OVEN_BREAKDOWN")), Some(json!("KITCHEN-A")));
        assert_eq!(hub.deliver(event.into()).await.unwrap(), 2);

        for viewer in [&mut a, &mut b] {
            let frame = decode(&viewer.next_frame().await.unwrap());
            assert_eq!(frame["event"], names::FAILURE_INJECTED);
            assert_eq!(frame["data"]["type"], "OVEN_BREAKDOWN");
            assert_eq!(frame["data"]["kitchenId"], "KITCHEN-A");
        }
    }

    #[tokio::test]
    async fn order_accepted_reaches_originator_as_new_order() {
        let hub = Hub::default();
        let mut origin = hub.add().await;
        let mut other = hub.add().await;
        let payload = json!({"orderId": "ORD-7", "storeId": "STORE-02", "items": [{"sku": "FRIES_L"}]});

        let frame = Frame {
            event: names::ORDER_ACCEPTED.to_owned(),
            data: payload.clone(),
        };
        assert_eq!(hub.receive(origin.id(), frame).await.unwrap(), 2);

        for viewer in [&mut origin, &mut other] {
            let frame = decode(&viewer.next_frame().await.unwrap());
            assert_eq!(frame["event"], names::NEW_ORDER);
            assert_eq!(frame["data"], payload);
        }
    }

    #[tokio::test]
    async fn removed_viewer_stops_receiving_and_others_continue() {
        let hub = Hub::default();
        let mut gone = hub.add().await;
        let mut stays = hub.add().await;

        assert!(hub.remove(gone.id()).await);
        assert!(!hub.remove(gone.id()).await);
        assert!(gone.next_frame().await.is_none());

        let event = HubEvent::from(FailureEvent::new(None, None));
        assert_eq!(hub.broadcast(&event).await.unwrap(), 1);
        assert!(stays.next_frame().await.is_some());
    }

    #[tokio::test]
    async fn closed_viewer_does_not_block_others() {
        let hub = Hub::default();
        let dropped = hub.add().await;
        let mut live = hub.add().await;
        drop(dropped);

        let event = HubEvent::from(FailureEvent::new(None, None));
        assert_eq!(hub.broadcast(&event).await.unwrap(), 1);
        assert!(live.next_frame().await.is_some());
    }

    #[tokio::test]
    async fn full_queue_drops_only_for_slow_viewer() {
        let hub = Hub::new(1);
        let mut slow = hub.add().await;
        let mut fast = hub.add().await;

        let first = HubEvent::from(FailureEvent::new(Some(json!("1")), None));
        let second = HubEvent::from(FailureEvent::new(Some(json!("2")), None));

        assert_eq!(hub.broadcast(&first).await.unwrap(), 2);
        assert!(fast.next_frame().await.is_some());
        assert_eq!(hub.broadcast(&second).await.unwrap(), 1);

        assert_eq!(decode(&fast.next_frame().await.unwrap())["data"]["type"], "2");
        assert_eq!(decode(&slow.next_frame().await.unwrap())["data"]["type"], "1");
    }

    #[tokio::test]
    async fn events_arrive_in_broadcast_order() {
        let hub = Hub::default();
        let mut viewer = hub.add().await;
        for n in 0..5 {
            let event = HubEvent::Opaque {
                event: "KITCHEN_LOAD".to_owned(),
                data: json!(n),
            };
            hub.broadcast(&event).await.unwrap();
        }
        for n in 0..5 {
            assert_eq!(decode(&viewer.next_frame().await.unwrap())["data"], json!(n));
        }
    }

    #[tokio::test]
    async fn close_all_ends_every_viewer() {
        let hub = Hub::default();
        let mut a = hub.add().await;
        let mut b = hub.add().await;
        hub.close_all().await;
        assert_eq!(hub.viewer_count().await, 0);
        assert!(a.next_frame().await.is_none());
        assert!(b.next_frame().await.is_none());
    }
}
