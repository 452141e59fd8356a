//! In-memory sinks and detectors shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use firewatch_types::{Detection, DetectionEvent};
use futures::future::BoxFuture;

use crate::detector::{Detector, DetectorError};
use crate::hub::{EventSink, SinkError};

/// Records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<DetectionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<DetectionEvent> {
        self.received.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn send<'a>(&'a self, payload: &'a str) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async move {
            let event: DetectionEvent = serde_json::from_str(payload)
                .map_err(|e| SinkError::Transport(e.to_string()))?;
            if let Ok(mut received) = self.received.lock() {
                received.push(event);
            }
            Ok(())
        })
    }
}

/// Always fails, like a connection that broke before the first send.
#[derive(Debug)]
pub struct FailingSink;

impl EventSink for FailingSink {
    fn send<'a>(&'a self, _payload: &'a str) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async { Err(SinkError::Closed) })
    }
}

/// Delivers until the far end closes it.
#[derive(Debug, Default)]
pub struct ClosingSink {
    closed: AtomicBool,
    sent: AtomicU64,
}

impl ClosingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl EventSink for ClosingSink {
    fn send<'a>(&'a self, _payload: &'a str) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async move {
            if self.closed.load(Ordering::Acquire) {
                return Err(SinkError::Closed);
            }
            self.sent.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    }
}

/// Never completes a send.
#[derive(Debug)]
pub struct HangingSink;

impl EventSink for HangingSink {
    fn send<'a>(&'a self, _payload: &'a str) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(futures::future::pending())
    }
}

/// Always returns no detections and counts calls.
#[derive(Debug, Default)]
pub struct EmptyDetector {
    calls: AtomicU64,
}

impl EmptyDetector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }
}

impl Detector for EmptyDetector {
    fn infer<'a>(
        &'a self,
        _source_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Detection>, DetectorError>> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Fails every other call, starting with the first.
#[derive(Debug, Default)]
pub struct FlakyDetector {
    calls: AtomicU64,
}

impl Detector for FlakyDetector {
    fn infer<'a>(
        &'a self,
        _source_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Detection>, DetectorError>> {
        let n = self.calls.fetch_add(1, Ordering::AcqRel);
        Box::pin(async move {
            if n % 2 == 0 {
                Err(DetectorError::Internal {
                    message: format!("simulated failure #{n}"),
                })
            } else {
                Ok(vec![Detection {
                    label: String::from("smoke"),
                    confidence: 0.75,
                    bbox: [10, 10, 50, 50],
                }])
            }
        })
    }
}

/// Never returns, like a wedged model.
#[derive(Debug, Default)]
pub struct HangingDetector {
    calls: AtomicU64,
}

impl HangingDetector {
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }
}

impl Detector for HangingDetector {
    fn infer<'a>(
        &'a self,
        _source_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Detection>, DetectorError>> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        Box::pin(futures::future::pending())
    }
}
