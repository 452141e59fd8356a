//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /ws/detections` -- `WebSocket` detection event stream
/// - `GET /api/health` -- liveness and version
/// - `GET /api/cameras` -- configured cameras
/// - `GET /api/cameras/{camera_id}` -- single camera
/// - `GET /api/monitor` -- scheduler counters
/// - `POST /api/monitor` -- start or stop monitoring
/// - `POST /api/test/simulate-detection` -- broadcast a synthetic detection
///
/// CORS allows any origin so the dashboard can be served separately.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/ws/detections", get(ws::ws_detections))
        // REST API
        .route("/api/health", get(handlers::health))
        .route("/api/cameras", get(handlers::list_cameras))
        .route("/api/cameras/{camera_id}", get(handlers::get_camera))
        .route(
            "/api/monitor",
            get(handlers::monitor).post(handlers::control_monitor),
        )
        .route(
            "/api/test/simulate-detection",
            post(handlers::simulate_detection),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
