//! Observer API server for Firewatch.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/detections`) streaming every
//!   [`DetectionEvent`] the schedulers publish, one JSON text frame per
//!   event
//! - **REST endpoints** for the camera list, service health, and
//!   per-camera monitoring counters
//!
//! # Architecture
//!
//! Each `WebSocket` connection registers a sink with the shared
//! [`BroadcastHub`] and stays subscribed until the client goes away or
//! the hub is closed for shutdown. REST handlers read the immutable
//! [`SourceRegistry`] and take the manager lock only to snapshot its
//! counters.
//!
//! [`DetectionEvent`]: firewatch_types::DetectionEvent
//! [`BroadcastHub`]: firewatch_core::BroadcastHub
//! [`SourceRegistry`]: firewatch_core::SourceRegistry

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, bind, serve};
pub use state::AppState;
