//! `WebSocket` handler for real-time detection streaming.
//!
//! Clients connect to `GET /ws/detections` and receive one JSON text frame
//! per [`DetectionEvent`](firewatch_types::DetectionEvent). The socket is
//! split: the write half is registered with the [`BroadcastHub`] as an
//! [`EventSink`], and the read half is drained here only to notice when
//! the client goes away. Anything the client sends is ignored.
//!
//! [`BroadcastHub`]: firewatch_core::BroadcastHub

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use firewatch_core::{EventSink, SinkError};
use futures::future::BoxFuture;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ObserverError;
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and subscribe it
/// to detection events.
///
/// # Route
///
/// `GET /ws/detections`
///
/// # Errors
///
/// Returns [`ObserverError::ShuttingDown`] once the hub has been closed.
pub async fn ws_detections(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    if state.hub.is_closed() {
        return Err(ObserverError::ShuttingDown);
    }
    Ok(ws.on_upgrade(|socket| handle_ws(socket, state)))
}

/// Write half of a client connection, as seen by the hub.
struct WsSink {
    tx: Mutex<SplitSink<WebSocket, Message>>,
}

impl EventSink for WsSink {
    fn send<'a>(&'a self, payload: &'a str) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async move {
            let mut tx = self.tx.lock().await;
            tx.send(Message::Text(payload.to_owned().into()))
                .await
                .map_err(|e| SinkError::Transport(e.to_string()))
        })
    }
}

impl WsSink {
    async fn close(&self) {
        let mut tx = self.tx.lock().await;
        if let Err(e) = tx.send(Message::Close(None)).await {
            debug!("WebSocket close frame not sent: {e}");
        }
    }
}

/// Handle the `WebSocket` lifecycle: connect to the hub, wait for the
/// client or the hub to end the session, then disconnect.
async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let (tx, mut rx) = socket.split();
    let sink = Arc::new(WsSink { tx: Mutex::new(tx) });
    let id = state.hub.connect(Arc::clone(&sink) as Arc<dyn EventSink>).await;
    debug!(subscriber = %id, "WebSocket client connected");

    let mut shutting_down = false;
    loop {
        tokio::select! {
            () = state.hub.closed() => {
                debug!(subscriber = %id, "Hub closed, ending WebSocket session");
                shutting_down = true;
                break;
            }
            received = tokio::time::timeout(state.keepalive, rx.next()) => {
                match received {
                    // Idle client; keep the subscription.
                    Err(_) => {}
                    Ok(Some(Ok(Message::Close(_))) | None) => {
                        debug!(subscriber = %id, "WebSocket client disconnected");
                        break;
                    }
                    Ok(Some(Err(e))) => {
                        debug!(subscriber = %id, "WebSocket error: {e}");
                        break;
                    }
                    Ok(Some(Ok(_))) => {}
                }
            }
        }
    }

    state.hub.disconnect(id).await;
    if shutting_down {
        sink.close().await;
    }
}
