//! Per-worker command channels.

use std::collections::HashMap;

use async_trait::async_trait;
use fsim_core::error::CoreError;
use fsim_core::types::DbId;
use fsim_protocol::Command;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Where outgoing commands go.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Hand `command` to the channel of `worker_id`.
    async fn send(&self, worker_id: DbId, command: &Command) -> Result<(), CoreError>;
}

/// Channel sender half for pushing serialized commands to a worker socket.
pub type CommandSender = mpsc::UnboundedSender<String>;

struct WorkerChannel {
    conn_id: Uuid,
    sender: CommandSender,
}

/// Open command channels, one per connected worker.
///
/// Thread-safe via interior `RwLock`; shared as `Arc<ChannelHub>` between
/// the socket handlers (which register and unregister) and the engine
/// (which sends).
#[derive(Default)]
pub struct ChannelHub {
    channels: RwLock<HashMap<DbId, WorkerChannel>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `worker_id`, replacing any older one.
    ///
    /// Returns the connection id to unregister with and the receiver the
    /// socket handler forwards to the wire.
    pub async fn register(&self, worker_id: DbId) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let (sender, rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();
        let previous = self
            .channels
            .write()
            .await
            .insert(worker_id, WorkerChannel { conn_id, sender });
        if previous.is_some() {
            tracing::warn!(worker_id, "Replacing existing command channel");
        }
        (conn_id, rx)
    }

    /// Remove the channel of `worker_id` if it still belongs to `conn_id`.
    /// Returns `true` when it was removed.
    pub async fn unregister(&self, worker_id: DbId, conn_id: Uuid) -> bool {
        let mut channels = self.channels.write().await;
        if channels.get(&worker_id).is_some_and(|c| c.conn_id == conn_id) {
            channels.remove(&worker_id);
            return true;
        }
        false
    }

    pub async fn is_connected(&self, worker_id: DbId) -> bool {
        self.channels.read().await.contains_key(&worker_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[async_trait]
impl CommandSink for ChannelHub {
    async fn send(&self, worker_id: DbId, command: &Command) -> Result<(), CoreError> {
        let text = command
            .to_json()
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        let channels = self.channels.read().await;
        let channel = channels.get(&worker_id).ok_or_else(|| {
            CoreError::Transport(format!("No command channel for worker {worker_id}"))
        })?;
        channel
            .sender
            .send(text)
            .map_err(|_| CoreError::Transport(format!("Command channel of worker {worker_id} is closed")))?;
        tracing::debug!(worker_id, method = command.method(), uuid = %command.id, "Command sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn send_reaches_registered_worker() {
        let hub = ChannelHub::new();
        let (_, mut rx) = hub.register(7).await;

        let cmd = Command::online();
        hub.send(7, &cmd).await.unwrap();

        let text = rx.recv().await.unwrap();
        assert_eq!(Command::from_json(&text).unwrap(), cmd);
    }

    #[tokio::test]
    async fn send_to_unknown_worker_is_transport_error() {
        let hub = ChannelHub::new();
        assert_matches!(
            hub.send(1, &Command::online()).await,
            Err(CoreError::Transport(_))
        );
    }

    #[tokio::test]
    async fn stale_unregister_keeps_newer_connection() {
        let hub = ChannelHub::new();
        let (old, _old_rx) = hub.register(3).await;
        let (new, _new_rx) = hub.register(3).await;

        assert!(!hub.unregister(3, old).await);
        assert!(hub.is_connected(3).await);
        assert!(hub.unregister(3, new).await);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn closed_receiver_is_transport_error() {
        let hub = ChannelHub::new();
        let (_, rx) = hub.register(2).await;
        drop(rx);
        assert_matches!(
            hub.send(2, &Command::online()).await,
            Err(CoreError::Transport(_))
        );
    }
}
