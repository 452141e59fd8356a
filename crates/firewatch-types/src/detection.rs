//! Detection results and the event pushed to subscribers.
//!
//! [`DetectionEvent`] is serialized once per broadcast and sent verbatim to
//! every subscriber. Field names follow the dashboard's wire contract
//! (`camera_id`, `timestamp`), not the Rust names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A detection whose fields fall outside their documented ranges.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidDetection {
    /// Confidence is not a finite value in `[0, 1]`.
    #[error("confidence {0} is outside [0, 1]")]
    Confidence(f64),

    /// The label is empty.
    #[error("detection label must not be empty")]
    EmptyLabel,
}

/// A single labeled, localized object found in one inference result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Detection {
    /// Class label, e.g. `fire` or `smoke`.
    #[serde(alias = "detection_type")]
    pub label: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    /// Bounding box as `[x1, y1, x2, y2]` pixel coordinates.
    pub bbox: [i32; 4],
}

impl Detection {
    /// Check the range invariants on a detection produced by an untrusted
    /// detector.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDetection`] describing the first violated invariant.
    pub fn validate(&self) -> Result<(), InvalidDetection> {
        if self.label.is_empty() {
            return Err(InvalidDetection::EmptyLabel);
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(InvalidDetection::Confidence(self.confidence));
        }
        Ok(())
    }
}

/// The timestamped bundle of detections produced by one scheduler tick for
/// one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DetectionEvent {
    /// Id of the source that produced the event.
    #[serde(rename = "camera_id")]
    pub source_id: String,
    /// UTC time the detection result was stamped.
    #[serde(rename = "timestamp")]
    #[ts(type = "string")]
    pub observed_at: DateTime<Utc>,
    /// Zero or more detections, in detector order.
    pub detections: Vec<Detection>,
}

impl DetectionEvent {
    /// Stamp a detection result with the current UTC time.
    pub fn now(source_id: impl Into<String>, detections: Vec<Detection>) -> Self {
        Self {
            source_id: source_id.into(),
            observed_at: Utc::now(),
            detections,
        }
    }
}
