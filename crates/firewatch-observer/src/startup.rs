//! Observer server startup helper for embedding in the engine binary.
//!
//! [`spawn_observer`] binds the listener eagerly, so a port conflict is
//! reported to the caller, then serves on a background Tokio task.
//!
//! # Usage
//!
//! ```rust,ignore
//! use firewatch_observer::startup::spawn_observer;
//!
//! let (tx, rx) = tokio::sync::oneshot::channel::<()>();
//! let handle = spawn_observer(&config, state, async { let _ = rx.await; }).await?;
//! // ... on shutdown:
//! let _ = tx.send(());
//! handle.await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the Observer HTTP server on a background Tokio task.
///
/// The returned [`JoinHandle`] completes after `shutdown` resolves and
/// the server has drained in-flight requests.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the server cannot bind to the
/// requested address. The bind happens before the task is spawned.
pub async fn spawn_observer<F>(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<JoinHandle<()>, StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = server::bind(config).await?;

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(port = config.port, "Observer server spawned on background task");

    Ok(handle)
}
