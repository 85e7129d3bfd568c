//! Worker endpoint: commands out, replies in.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fsim_core::store::WorkerStore;
use fsim_core::worker::Worker;
use futures::{SinkExt, StreamExt};

use crate::state::AppState;

/// Upgrade a worker connection.
///
/// Workers are identified by their source address; unknown peers are
/// refused before the upgrade.
pub async fn commands_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let ip = addr.ip().to_canonical().to_string();
    let worker = match state.store.find_worker_by_ip(&ip).await {
        Ok(Some(worker)) => worker,
        Ok(None) => {
            tracing::warn!(%ip, "Rejecting connection from unknown worker");
            return StatusCode::FORBIDDEN.into_response();
        }
        Err(e) => {
            tracing::error!(%ip, error = %e, "Worker lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_worker_socket(socket, state, worker))
}

/// Manage one worker connection after upgrade.
///
///   1. Registers a command channel with the hub.
///   2. Spawns a sender task forwarding that channel to the socket.
///   3. Starts the `online` handshake.
///   4. Feeds every inbound text frame to the reply processor.
///   5. Tears the worker down on disconnect.
async fn handle_worker_socket(socket: WebSocket, state: AppState, worker: Worker) {
    let worker_id = worker.id;
    let (conn_id, mut rx) = state.hub.register(worker_id).await;
    tracing::info!(worker_id, name = %worker.name, %conn_id, "Worker connected");

    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!(worker_id, "Worker socket sink closed");
                break;
            }
        }
    });

    if let Err(e) = state.engine.worker_connected(&worker).await {
        tracing::error!(worker_id, error = %e, "Failed to start online handshake");
    }

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => state.engine.process_text(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                tracing::trace!(worker_id, "Ignoring binary frame");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(worker_id, error = %e, "Worker socket receive error");
                break;
            }
        }
    }

    send_task.abort();
    if state.hub.unregister(worker_id, conn_id).await {
        if let Err(e) = state.engine.worker_disconnected(worker_id).await {
            tracing::error!(worker_id, error = %e, "Failed to tear down worker");
        }
    } else {
        tracing::debug!(worker_id, %conn_id, "Connection superseded, keeping worker state");
    }
    tracing::info!(worker_id, %conn_id, "Worker socket closed");
}
