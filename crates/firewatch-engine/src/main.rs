//! Engine binary for Firewatch.
//!
//! Wires the camera registry, detector, broadcast hub, source manager and
//! Observer API together and runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `firewatch-config.yaml` (or
//!    `FIREWATCH_CONFIG`), with `FIREWATCH_*` overrides
//! 2. Initialize structured logging (tracing)
//! 3. Load the camera list; any bad entry aborts startup
//! 4. Build the configured detector
//! 5. Create the broadcast hub and source manager
//! 6. Start the Observer API server
//! 7. Start one scheduler per camera
//! 8. Wait for `Ctrl-C`
//!
//! # Shutdown Sequence
//!
//! Stop the manager (awaiting every scheduler), close the hub so open
//! `WebSocket` sessions end, then let the server drain and exit.

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use firewatch_core::config::{DetectorConfig, DetectorKind, LoggingConfig};
use firewatch_core::{
    BroadcastHub, Detector, FirewatchConfig, ProcessDetector, SourceManager, SourceRegistry,
    StubDetector,
};
use firewatch_observer::server::ServerConfig;
use firewatch_observer::startup::spawn_observer;
use firewatch_observer::state::AppState;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "firewatch-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any startup step fails. Errors after startup are
/// logged and do not abort the process.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::var("FIREWATCH_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = FirewatchConfig::load_or_default(&config_path).map_err(EngineError::from)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);

    info!(
        app = config.app.name,
        version = config.app.version,
        config_path = %config_path.display(),
        interval_ms = config.scheduler.interval_ms,
        detector_timeout_ms = config.scheduler.detector_timeout_ms,
        "firewatch-engine starting"
    );

    // 3. Load the camera list.
    let registry = SourceRegistry::load(&config.sources.path).map_err(EngineError::from)?;
    if registry.is_empty() {
        warn!(path = %config.sources.path.display(), "No cameras configured");
    }

    // 4. Build the detector.
    let detector = build_detector(&config.detector)?;

    // 5. Create the hub and manager.
    let hub = Arc::new(BroadcastHub::new(&config.hub));
    let manager = Arc::new(Mutex::new(SourceManager::new(detector, config.scheduler)));

    // 6. Start Observer API server.
    let app_state = Arc::new(
        AppState::new(
            registry.clone(),
            Arc::clone(&hub),
            Arc::clone(&manager),
            config.app.clone(),
        )
        .with_keepalive(config.hub.keepalive()),
    );
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_config = ServerConfig::from(&config.server);
    let server_handle = spawn_observer(&server_config, app_state, async {
        // A dropped sender also means shut down.
        let _ = shutdown_rx.await;
    })
    .await
    .map_err(EngineError::from)?;

    // 7. Start monitoring.
    manager.lock().await.start(registry.sources(), &hub);
    info!(cameras = registry.len(), "Monitoring started");

    // 8. Run until interrupted.
    tokio::signal::ctrl_c().await.map_err(EngineError::from)?;
    info!("Shutdown signal received");

    let pending = manager.lock().await.begin_stop();
    pending.join().await;
    hub.close();
    if shutdown_tx.send(()).is_err() {
        warn!("Observer server already stopped");
    }
    if let Err(e) = server_handle.await {
        warn!(error = %e, "Observer server task failed");
    }

    info!("firewatch-engine shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Build the detector selected by `detector.kind`.
fn build_detector(config: &DetectorConfig) -> Result<Arc<dyn Detector>, EngineError> {
    match config.kind {
        DetectorKind::Stub => {
            let detector = config
                .seed
                .map_or_else(StubDetector::new, StubDetector::with_seed);
            info!(seed = ?config.seed, "Using stub detector");
            Ok(Arc::new(detector))
        }
        DetectorKind::Process => {
            let program = config
                .program
                .clone()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| EngineError::Detector {
                    message: String::from("detector.program is not set"),
                })?;
            info!(program = program, args = ?config.args, "Using process detector");
            Ok(Arc::new(ProcessDetector::new(program, config.args.clone())))
        }
    }
}
