//! Shared type definitions for the Firewatch detection service.
//!
//! Wire types defined here flow downstream to `TypeScript` via `ts-rs` for
//! the monitoring dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for runtime handles
//! - [`source`] -- Camera definitions and their origin invariant
//! - [`detection`] -- Detections and the event fanned out to subscribers
//! - [`status`] -- Health and monitor payloads

pub mod detection;
pub mod ids;
pub mod source;
pub mod status;

// Re-export all public types at crate root for convenience.
pub use detection::{Detection, DetectionEvent, InvalidDetection};
pub use ids::SubscriberId;
pub use source::{CameraInfo, Source, SourceError, SourceOrigin};
pub use status::{HealthResponse, MonitorStatus, SourceStatus};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // Exporting writes the files into `bindings/` relative to the
        // crate root.
        use ts_rs::TS;

        let _ = crate::ids::SubscriberId::export_all();
        let _ = crate::source::CameraInfo::export_all();
        let _ = crate::detection::Detection::export_all();
        let _ = crate::detection::DetectionEvent::export_all();
        let _ = crate::status::HealthResponse::export_all();
        let _ = crate::status::SourceStatus::export_all();
        let _ = crate::status::MonitorStatus::export_all();
    }
}
