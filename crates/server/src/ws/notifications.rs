//! Observer endpoint: every bus notification, as JSON text frames.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use fsim_events::NotificationBus;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

pub async fn notifications_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_observer_socket(socket, state.bus))
}

async fn handle_observer_socket(socket: WebSocket, bus: Arc<NotificationBus>) {
    let mut rx = bus.subscribe();
    let (mut sink, mut stream) = socket.split();
    tracing::info!("Observer connected");

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(status) => {
                    let text = match status.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode notification");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Observer lagging, notifications dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!("Observer disconnected");
}
