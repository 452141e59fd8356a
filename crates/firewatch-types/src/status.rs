//! Read-only status payloads served by the query endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Response body for `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Application version string.
    pub version: String,
}

/// Per-source scheduler counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SourceStatus {
    /// Source identifier.
    pub camera_id: String,
    /// Human-readable source name.
    pub name: String,
    /// Whether a scheduler task is currently running for this source.
    pub is_monitoring: bool,
    /// Completed ticks (successful or faulted).
    pub ticks: u64,
    /// Ticks that produced a broadcast event.
    pub events_broadcast: u64,
    /// Ticks skipped because the detector failed or timed out.
    pub faults: u64,
    /// Timestamp of the most recent broadcast event.
    #[ts(type = "string | null")]
    pub last_observed_at: Option<DateTime<Utc>>,
}

/// Response body for `GET /api/monitor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MonitorStatus {
    /// Whether the source manager is running.
    pub running: bool,
    /// Number of sources in the registry.
    pub total_cameras: usize,
    /// Number of live subscribers on the hub.
    pub subscribers: usize,
    /// Per-source counters, in registry order.
    pub cameras: Vec<SourceStatus>,
}
