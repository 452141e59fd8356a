//! Per-source scheduling loop.
//!
//! One [`SourceScheduler`] runs per registered source, each on its own
//! Tokio task. A tick is:
//!
//! 1. Call the detector, bounded by the detector timeout
//! 2. Stamp the result into a [`DetectionEvent`]
//! 3. Broadcast it through the hub and wait for delivery to finish
//! 4. Sleep the configured interval
//!
//! A slow hub delays only this source's next tick. Detector failures and
//! timeouts skip the tick and the loop carries on.
//!
//! Cancellation is observed while waiting on the detector and while
//! sleeping. A broadcast that has started always completes, so no
//! subscriber sees part of a tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use firewatch_types::{DetectionEvent, Source, SourceStatus};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::detector::{Detector, DetectorError};
use crate::hub::{BroadcastHub, BroadcastOutcome};

/// Counters for one source, updated by its scheduler and read by the
/// monitor endpoint.
#[derive(Debug, Default)]
pub struct SourceStats {
    ticks: AtomicU64,
    events_broadcast: AtomicU64,
    faults: AtomicU64,
    last_observed_at: RwLock<Option<DateTime<Utc>>>,
}

impl SourceStats {
    /// Completed ticks, successful or faulted.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Ticks whose event was handed to the hub.
    pub fn events_broadcast(&self) -> u64 {
        self.events_broadcast.load(Ordering::Acquire)
    }

    /// Ticks skipped because of a detector fault.
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Acquire)
    }

    /// Timestamp of the most recent broadcast event.
    pub fn last_observed_at(&self) -> Option<DateTime<Utc>> {
        self.last_observed_at.read().map_or(None, |guard| *guard)
    }

    /// Project the counters into a status row.
    pub fn to_status(&self, source: &Source, is_monitoring: bool) -> SourceStatus {
        SourceStatus {
            camera_id: source.id().to_owned(),
            name: source.display_name().to_owned(),
            is_monitoring,
            ticks: self.ticks(),
            events_broadcast: self.events_broadcast(),
            faults: self.faults(),
            last_observed_at: self.last_observed_at(),
        }
    }

    fn record_event(&self, observed_at: DateTime<Utc>) {
        self.ticks.fetch_add(1, Ordering::AcqRel);
        self.events_broadcast.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut guard) = self.last_observed_at.write() {
            *guard = Some(observed_at);
        }
    }

    fn record_fault(&self) {
        self.ticks.fetch_add(1, Ordering::AcqRel);
        self.faults.fetch_add(1, Ordering::AcqRel);
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The event was broadcast.
    Broadcast(BroadcastOutcome),
    /// The detector failed or timed out; nothing was broadcast.
    Faulted,
}

/// The repeating detect/broadcast/sleep loop for one source.
pub struct SourceScheduler {
    source: Source,
    detector: Arc<dyn Detector>,
    hub: Arc<BroadcastHub>,
    config: SchedulerConfig,
    stats: Arc<SourceStats>,
}

impl SourceScheduler {
    /// Create a scheduler for `source`.
    pub fn new(
        source: Source,
        detector: Arc<dyn Detector>,
        hub: Arc<BroadcastHub>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            source,
            detector,
            hub,
            config,
            stats: Arc::new(SourceStats::default()),
        }
    }

    /// Shared handle to this scheduler's counters.
    pub fn stats(&self) -> Arc<SourceStats> {
        Arc::clone(&self.stats)
    }

    /// The source this scheduler polls.
    pub const fn source(&self) -> &Source {
        &self.source
    }

    /// Run until `cancel` turns `true` or its sender is dropped.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        let source_id = self.source.id().to_owned();
        info!(
            camera_id = %source_id,
            interval_ms = self.config.interval_ms,
            "Source scheduler started"
        );

        loop {
            if is_cancelled(&cancel) {
                break;
            }

            let detected = tokio::select! {
                biased;
                () = cancelled(&mut cancel) => break,
                result = self.detect() => result,
            };
            self.publish(detected).await;

            tokio::select! {
                biased;
                () = cancelled(&mut cancel) => break,
                () = tokio::time::sleep(self.config.interval()) => {}
            }
        }

        info!(
            camera_id = %source_id,
            ticks = self.stats.ticks(),
            faults = self.stats.faults(),
            "Source scheduler stopped"
        );
    }

    /// Run a single tick without sleeping afterwards.
    pub async fn tick(&self) -> TickOutcome {
        let detected = self.detect().await;
        self.publish(detected).await
    }

    async fn detect(&self) -> Result<DetectionEvent, DetectorError> {
        let source_id = self.source.id();
        let detections =
            tokio::time::timeout(self.config.detector_timeout(), self.detector.infer(source_id))
                .await
                .map_err(|_elapsed| DetectorError::Timeout {
                    source_id: source_id.to_owned(),
                    timeout_ms: self.config.detector_timeout_ms,
                })??;
        Ok(DetectionEvent::now(source_id, detections))
    }

    async fn publish(&self, detected: Result<DetectionEvent, DetectorError>) -> TickOutcome {
        match detected {
            Ok(event) => {
                let outcome = self.hub.broadcast(&event).await;
                self.stats.record_event(event.observed_at);
                debug!(
                    camera_id = %event.source_id,
                    detections = event.detections.len(),
                    delivered = outcome.delivered,
                    dropped = outcome.dropped,
                    "Detection event broadcast"
                );
                TickOutcome::Broadcast(outcome)
            }
            Err(e) => {
                self.stats.record_fault();
                warn!(camera_id = %self.source.id(), error = %e, "Detection tick skipped");
                TickOutcome::Faulted
            }
        }
    }
}

impl std::fmt::Debug for SourceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceScheduler")
            .field("source", &self.source.id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || cancel.has_changed().is_err()
}

/// Resolve when cancellation is requested or the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}
