//! Broadcast hub: the live subscriber set and fan-out delivery.
//!
//! The hub owns every subscriber's send capability. Schedulers call
//! [`BroadcastHub::broadcast`] once per tick; transport handlers call
//! [`connect`](BroadcastHub::connect) after the handshake and
//! [`disconnect`](BroadcastHub::disconnect) when the far end goes away.
//!
//! # Locking
//!
//! A single async mutex covers add, remove and the whole delivery of one
//! event. Broadcasts are therefore globally serialized, which is what gives
//! each subscriber the events in `broadcast` call order. Within one
//! broadcast the sends run concurrently, so a slow subscriber costs at most
//! one send timeout rather than one per subscriber.
//!
//! # Failure isolation
//!
//! A send that errors or exceeds the send timeout removes that subscriber
//! and nothing else. Neither the producing scheduler nor the other
//! subscribers observe the failure.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use firewatch_types::{DetectionEvent, SubscriberId};
use futures::future::{BoxFuture, join_all};
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::config::HubConfig;

/// A send to one subscriber failed; the subscriber is unusable.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The far end closed the connection.
    #[error("subscriber connection closed")]
    Closed,

    /// The transport reported an error.
    #[error("transport error: {0}")]
    Transport(String),
}

/// The send half of one subscriber connection.
///
/// Implemented by the `WebSocket` transport in the observer crate and by
/// in-memory doubles in tests.
pub trait EventSink: Send + Sync {
    /// Deliver one serialized event.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the connection can no longer carry
    /// messages. The hub drops the subscriber on any error.
    fn send<'a>(&'a self, payload: &'a str) -> BoxFuture<'a, Result<(), SinkError>>;
}

/// Result of one [`BroadcastHub::broadcast`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Subscribers that accepted the event.
    pub delivered: usize,
    /// Subscribers removed because their send failed or timed out.
    pub dropped: usize,
}

/// Owner of the live subscriber set.
///
/// Constructed once by the binary and shared as `Arc<BroadcastHub>` with
/// the source manager and the `WebSocket` route.
pub struct BroadcastHub {
    subscribers: Mutex<BTreeMap<SubscriberId, Arc<dyn EventSink>>>,
    send_timeout: Duration,
    closed: watch::Sender<bool>,
}

impl BroadcastHub {
    /// Create an empty hub from configuration.
    pub fn new(config: &HubConfig) -> Self {
        Self::with_send_timeout(config.send_timeout())
    }

    /// Create an empty hub with an explicit per-subscriber send timeout.
    pub fn with_send_timeout(send_timeout: Duration) -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            send_timeout,
            closed: watch::Sender::new(false),
        }
    }

    /// Add a subscriber whose handshake has completed.
    ///
    /// Returns the handle identifying this membership. Connecting the same
    /// sink twice creates two independent memberships.
    pub async fn connect(&self, sink: Arc<dyn EventSink>) -> SubscriberId {
        let id = SubscriberId::new();
        let mut subscribers = self.subscribers.lock().await;
        subscribers.insert(id, sink);
        debug!(subscriber = %id, live = subscribers.len(), "Subscriber connected");
        id
    }

    /// Remove a subscriber. Returns whether it was present; removing an
    /// absent subscriber is a no-op.
    pub async fn disconnect(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().await;
        let removed = subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, live = subscribers.len(), "Subscriber disconnected");
        }
        removed
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Returns once every delivery attempt has finished. Subscribers whose
    /// send fails are removed before the lock is released. Never fails.
    pub async fn broadcast(&self, event: &DetectionEvent) -> BroadcastOutcome {
        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                warn!(camera_id = %event.source_id, "Failed to serialize detection event: {e}");
                return BroadcastOutcome::default();
            }
        };

        let mut subscribers = self.subscribers.lock().await;
        if subscribers.is_empty() {
            return BroadcastOutcome::default();
        }

        let attempts = subscribers.iter().map(|(id, sink)| {
            let payload = payload.as_str();
            async move {
                match tokio::time::timeout(self.send_timeout, sink.send(payload)).await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => {
                        debug!(subscriber = %id, error = %e, "Send failed, dropping subscriber");
                        Some(*id)
                    }
                    Err(_) => {
                        debug!(
                            subscriber = %id,
                            timeout = ?self.send_timeout,
                            "Send timed out, dropping subscriber"
                        );
                        Some(*id)
                    }
                }
            }
        });
        let stale: Vec<SubscriberId> = join_all(attempts).await.into_iter().flatten().collect();

        let attempted = subscribers.len();
        for id in &stale {
            subscribers.remove(id);
        }

        BroadcastOutcome {
            delivered: attempted.saturating_sub(stale.len()),
            dropped: stale.len(),
        }
    }

    /// Number of live subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Whether `id` is currently in the live set.
    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().await.contains_key(&id)
    }

    /// Signal transport handlers that the service is shutting down.
    ///
    /// Subscribers stay in the live set until their handlers disconnect
    /// them.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolve once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives as long as `self`, so this only returns on close.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("send_timeout", &self.send_timeout)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(&HubConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use std::sync::Arc;

    use firewatch_types::Detection;

    use super::*;
    use crate::test_support::{ClosingSink, FailingSink, HangingSink, RecordingSink};

    fn event(source_id: &str) -> DetectionEvent {
        DetectionEvent::now(source_id, Vec::new())
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let hub = BroadcastHub::default();
        let a = RecordingSink::new();
        let b = RecordingSink::new();
        hub.connect(a.clone()).await;
        hub.connect(b.clone()).await;

        let outcome = hub.broadcast(&event("cam1")).await;

        assert_eq!(outcome, BroadcastOutcome { delivered: 2, dropped: 0 });
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
        assert_eq!(a.events()[0].source_id, "cam1");
    }

    #[tokio::test]
    async fn broken_subscribers_are_removed_and_others_still_receive() {
        let hub = BroadcastHub::default();
        let healthy: Vec<_> = (0..3).map(|_| RecordingSink::new()).collect();
        for sink in &healthy {
            hub.connect(sink.clone()).await;
        }
        let broken_a = hub.connect(Arc::new(FailingSink)).await;
        let broken_b = hub.connect(Arc::new(FailingSink)).await;
        assert_eq!(hub.subscriber_count().await, 5);

        let outcome = hub.broadcast(&event("cam1")).await;

        assert_eq!(outcome, BroadcastOutcome { delivered: 3, dropped: 2 });
        assert_eq!(hub.subscriber_count().await, 3);
        assert!(!hub.contains(broken_a).await);
        assert!(!hub.contains(broken_b).await);
        for sink in &healthy {
            assert_eq!(sink.events().len(), 1);
        }
    }

    #[tokio::test]
    async fn far_end_close_shrinks_live_set() {
        let hub = BroadcastHub::default();
        let survivor = RecordingSink::new();
        let closing = ClosingSink::new();
        hub.connect(survivor.clone()).await;
        hub.connect(closing.clone()).await;
        assert_eq!(hub.subscriber_count().await, 2);

        closing.close();
        let outcome = hub.broadcast(&event("cam1")).await;

        assert_eq!(outcome.delivered, 1);
        assert_eq!(hub.subscriber_count().await, 1);
        assert_eq!(survivor.events().len(), 1);
    }

    #[tokio::test]
    async fn per_subscriber_order_matches_broadcast_order() {
        let hub = BroadcastHub::default();
        let sink = RecordingSink::new();
        hub.connect(sink.clone()).await;

        for i in 0..50 {
            hub.broadcast(&event(&format!("cam{i}"))).await;
        }

        let ids: Vec<String> = sink.events().into_iter().map(|e| e.source_id).collect();
        let expected: Vec<String> = (0..50).map(|i| format!("cam{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn concurrent_producers_keep_per_source_order() {
        let hub = Arc::new(BroadcastHub::default());
        let sink = RecordingSink::new();
        hub.connect(sink.clone()).await;

        let mut handles = Vec::new();
        for source in ["cam1", "cam2", "cam3"] {
            let hub = Arc::clone(&hub);
            handles.push(tokio::spawn(async move {
                for seq in 0..20_i32 {
                    let event = DetectionEvent::now(
                        source,
                        vec![Detection {
                            label: String::from("seq"),
                            confidence: 0.5,
                            bbox: [seq, 0, 0, 0],
                        }],
                    );
                    hub.broadcast(&event).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let events = sink.events();
        assert_eq!(events.len(), 60);
        for source in ["cam1", "cam2", "cam3"] {
            let seqs: Vec<i32> = events
                .iter()
                .filter(|e| e.source_id == source)
                .map(|e| e.detections[0].bbox[0])
                .collect();
            assert_eq!(seqs, (0..20).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let hub = BroadcastHub::default();
        let sink = RecordingSink::new();
        let id = hub.connect(sink.clone()).await;

        assert!(hub.disconnect(id).await);
        assert!(!hub.disconnect(id).await);
        assert!(!hub.disconnect(SubscriberId::new()).await);
        assert_eq!(hub.subscriber_count().await, 0);

        hub.broadcast(&event("cam1")).await;
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn same_sink_connected_twice_receives_twice() {
        let hub = BroadcastHub::default();
        let sink = RecordingSink::new();
        let first = hub.connect(sink.clone()).await;
        let second = hub.connect(sink.clone()).await;
        assert_ne!(first, second);

        hub.broadcast(&event("cam1")).await;
        assert_eq!(sink.events().len(), 2);

        hub.disconnect(first).await;
        hub.broadcast(&event("cam1")).await;
        assert_eq!(sink.events().len(), 3);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let hub = BroadcastHub::default();
        let early = RecordingSink::new();
        hub.connect(early.clone()).await;
        hub.broadcast(&event("first")).await;

        let late = RecordingSink::new();
        hub.connect(late.clone()).await;
        hub.broadcast(&event("second")).await;

        assert_eq!(early.events().len(), 2);
        let late_events = late.events();
        assert_eq!(late_events.len(), 1);
        assert_eq!(late_events[0].source_id, "second");
    }

    #[tokio::test]
    async fn broadcast_with_no_subscribers_is_noop() {
        let hub = BroadcastHub::default();
        assert_eq!(hub.broadcast(&event("cam1")).await, BroadcastOutcome::default());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_subscriber_is_dropped_after_send_timeout() {
        let hub = BroadcastHub::with_send_timeout(Duration::from_millis(100));
        let healthy = RecordingSink::new();
        hub.connect(healthy.clone()).await;
        hub.connect(Arc::new(HangingSink)).await;

        let outcome = hub.broadcast(&event("cam1")).await;

        assert_eq!(outcome, BroadcastOutcome { delivered: 1, dropped: 1 });
        assert_eq!(hub.subscriber_count().await, 1);
        assert_eq!(healthy.events().len(), 1);
    }

    #[tokio::test]
    async fn closed_resolves_after_close() {
        let hub = Arc::new(BroadcastHub::default());
        assert!(!hub.is_closed());

        let waiter = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.closed().await })
        };
        hub.close();
        waiter.await.unwrap();
        assert!(hub.is_closed());
    }
}
