//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the handles the routes need: the camera registry
//! served by `GET /api/cameras`, the broadcast hub `WebSocket` clients
//! subscribe to, and the source manager whose counters back
//! `GET /api/monitor`.

use std::sync::Arc;
use std::time::Duration;

use firewatch_core::config::{AppConfig, HubConfig};
use firewatch_core::{BroadcastHub, SourceManager, SourceRegistry};
use tokio::sync::Mutex;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The configured cameras.
    pub registry: SourceRegistry,
    /// Fan-out point for detection events.
    pub hub: Arc<BroadcastHub>,
    /// Scheduler lifecycle owner.
    pub manager: Arc<Mutex<SourceManager>>,
    /// Service identity reported by the health endpoint.
    pub app: AppConfig,
    /// How long a `WebSocket` receive may idle before the handler loops.
    pub keepalive: Duration,
}

impl AppState {
    /// Create application state with the default keepalive.
    pub fn new(
        registry: SourceRegistry,
        hub: Arc<BroadcastHub>,
        manager: Arc<Mutex<SourceManager>>,
        app: AppConfig,
    ) -> Self {
        Self {
            registry,
            hub,
            manager,
            app,
            keepalive: HubConfig::default().keepalive(),
        }
    }

    /// Override the `WebSocket` keepalive.
    #[must_use]
    pub const fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }
}
