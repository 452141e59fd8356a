//! REST API endpoint handlers for the Observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/health` | Liveness and version |
//! | `GET` | `/api/cameras` | Configured camera list |
//! | `GET` | `/api/cameras/{camera_id}` | Single camera |
//! | `GET` | `/api/monitor` | Scheduler state and per-camera counters |
//! | `POST` | `/api/monitor` | Start or stop every scheduler |
//! | `POST` | `/api/test/simulate-detection` | Push a synthetic detection to subscribers |

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use firewatch_types::{
    CameraInfo, Detection, DetectionEvent, HealthResponse, MonitorStatus, SourceStatus,
};
use rand::Rng;
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/monitor`.
#[derive(Debug, serde::Deserialize)]
pub struct MonitorCommand {
    /// `start` or `stop`.
    pub action: String,
}

/// Body of `POST /api/test/simulate-detection`.
#[derive(Debug, serde::Deserialize)]
pub struct SimulateRequest {
    /// Camera the synthetic detection is attributed to.
    pub camera_id: String,
}

/// Response of `POST /api/test/simulate-detection`.
#[derive(Debug, serde::Serialize)]
pub struct SimulateResponse {
    /// Subscribers that received the event.
    pub delivered: usize,
    /// The event that was broadcast.
    pub event: DetectionEvent,
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Report that the service is up, with its configured version.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: String::from("ok"),
        version: state.app.version.clone(),
    })
}

// ---------------------------------------------------------------------------
// GET /api/cameras
// ---------------------------------------------------------------------------

/// List every configured camera in registry order.
pub async fn list_cameras(State(state): State<Arc<AppState>>) -> Json<Vec<CameraInfo>> {
    Json(state.registry.camera_infos())
}

/// Return a single camera by id.
pub async fn get_camera(
    State(state): State<Arc<AppState>>,
    Path(camera_id): Path<String>,
) -> Result<Json<CameraInfo>, ObserverError> {
    state
        .registry
        .get(&camera_id)
        .map(|source| Json(source.to_info()))
        .ok_or_else(|| ObserverError::NotFound(format!("camera {camera_id}")))
}

// ---------------------------------------------------------------------------
// GET/POST /api/monitor
// ---------------------------------------------------------------------------

/// Report whether monitoring is running, the live subscriber count, and
/// per-camera counters.
pub async fn monitor(State(state): State<Arc<AppState>>) -> Json<MonitorStatus> {
    Json(monitor_status(&state).await)
}

/// Start or stop monitoring for every configured camera.
///
/// Both actions are idempotent. `stop` returns after every scheduler has
/// terminated, without holding the manager lock while they unwind.
///
/// # Errors
///
/// Returns [`ObserverError::BadRequest`] for an unknown action and
/// [`ObserverError::ShuttingDown`] for `start` after the hub was closed.
pub async fn control_monitor(
    State(state): State<Arc<AppState>>,
    Json(command): Json<MonitorCommand>,
) -> Result<Json<MonitorStatus>, ObserverError> {
    match command.action.as_str() {
        "start" => {
            if state.hub.is_closed() {
                return Err(ObserverError::ShuttingDown);
            }
            let started = state
                .manager
                .lock()
                .await
                .start(state.registry.sources(), &state.hub);
            info!(started, "Monitoring start requested");
        }
        "stop" => {
            let pending = state.manager.lock().await.begin_stop();
            info!(schedulers = pending.len(), "Monitoring stop requested");
            pending.join().await;
        }
        other => {
            return Err(ObserverError::BadRequest(format!(
                "invalid action `{other}`, use \"start\" or \"stop\""
            )));
        }
    }
    Ok(Json(monitor_status(&state).await))
}

/// Cameras without a scheduler in the current or last run are listed with
/// zeroed counters.
async fn monitor_status(state: &AppState) -> MonitorStatus {
    let (running, mut by_id) = {
        let manager = state.manager.lock().await;
        let by_id: BTreeMap<String, SourceStatus> = manager
            .status()
            .into_iter()
            .map(|s| (s.camera_id.clone(), s))
            .collect();
        (manager.is_running(), by_id)
    };

    let cameras = state
        .registry
        .sources()
        .iter()
        .map(|source| {
            by_id.remove(source.id()).unwrap_or_else(|| SourceStatus {
                camera_id: source.id().to_owned(),
                name: source.display_name().to_owned(),
                is_monitoring: false,
                ticks: 0,
                events_broadcast: 0,
                faults: 0,
                last_observed_at: None,
            })
        })
        .collect();

    MonitorStatus {
        running,
        total_cameras: state.registry.len(),
        subscribers: state.hub.subscriber_count().await,
        cameras,
    }
}

// ---------------------------------------------------------------------------
// POST /api/test/simulate-detection
// ---------------------------------------------------------------------------

/// Broadcast one random fire/smoke detection for a configured camera, as
/// if its detector had produced it.
///
/// # Errors
///
/// Returns [`ObserverError::NotFound`] if the camera is not configured.
pub async fn simulate_detection(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimulateRequest>,
) -> Result<Json<SimulateResponse>, ObserverError> {
    let source = state
        .registry
        .get(&request.camera_id)
        .ok_or_else(|| ObserverError::NotFound(format!("camera {}", request.camera_id)))?;

    let event = DetectionEvent::now(source.id(), vec![random_detection()]);
    let outcome = state.hub.broadcast(&event).await;
    info!(
        camera_id = %event.source_id,
        delivered = outcome.delivered,
        "Simulated detection broadcast"
    );

    Ok(Json(SimulateResponse {
        delivered: outcome.delivered,
        event,
    }))
}

/// Confidence in `[0.7, 1.0]`; the box's top-left corner lies in the
/// upper-left quadrant of a 400x300 frame.
fn random_detection() -> Detection {
    let mut rng = rand::rng();
    let label = if rng.random_bool(0.5) { "fire" } else { "smoke" };
    let confidence = (rng.random_range(0.7..1.0_f64) * 1000.0).round() / 1000.0;
    Detection {
        label: label.to_owned(),
        confidence,
        bbox: [
            rng.random_range(0..200),
            rng.random_range(0..150),
            rng.random_range(200..400),
            rng.random_range(150..300),
        ],
    }
}
