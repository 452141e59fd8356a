//! Detection scheduling and fan-out for Firewatch.
//!
//! This crate owns the concurrency machinery: one scheduler task per
//! camera producing detection events, and a broadcast hub delivering each
//! event to every live subscriber.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `firewatch-config.yaml` into
//!   strongly-typed structs.
//! - [`registry`] -- [`SourceRegistry`], the validated camera list.
//! - [`detector`] -- [`Detector`] trait, [`StubDetector`] and
//!   [`ProcessDetector`].
//! - [`hub`] -- [`BroadcastHub`] and the [`EventSink`] transport seam.
//! - [`scheduler`] -- The per-source detect/broadcast/sleep loop.
//! - [`manager`] -- [`SourceManager`], which starts and stops the
//!   schedulers.
//!
//! [`SourceRegistry`]: registry::SourceRegistry
//! [`Detector`]: detector::Detector
//! [`StubDetector`]: detector::StubDetector
//! [`ProcessDetector`]: detector::ProcessDetector
//! [`BroadcastHub`]: hub::BroadcastHub
//! [`EventSink`]: hub::EventSink
//! [`SourceManager`]: manager::SourceManager

pub mod config;
pub mod detector;
pub mod hub;
pub mod manager;
pub mod registry;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use config::FirewatchConfig;
pub use detector::{Detector, DetectorError, ProcessDetector, StubDetector};
pub use hub::{BroadcastHub, BroadcastOutcome, EventSink, SinkError};
pub use manager::{ManagerState, PendingStop, SourceManager};
pub use registry::{RegistryError, SourceRegistry};
pub use scheduler::{SourceScheduler, SourceStats, TickOutcome};
