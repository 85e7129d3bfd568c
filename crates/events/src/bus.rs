//! In-process notification bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`NotificationBus`] is shared via `Arc<NotificationBus>` between the
//! engine (publisher) and the observer WebSocket endpoint (subscribers).

use fsim_protocol::Status;
use tokio::sync::broadcast;

use crate::notification::Notification;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus for notifications.
///
/// Every published item is a complete [`Status`] envelope, ready to be
/// serialized to observers.
pub struct NotificationBus {
    sender: broadcast::Sender<Status>,
}

impl NotificationBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a typed notification with an `ok` outcome.
    pub fn publish(&self, notification: impl Into<Notification>) {
        match serde_json::to_value(notification.into()) {
            Ok(payload) => self.send(Status::ok(payload)),
            Err(e) => tracing::error!(error = %e, "Failed to encode notification"),
        }
    }

    /// Publish a plain error message with an `err` outcome.
    pub fn publish_error(&self, message: impl Into<String>) {
        self.send(Status::err(serde_json::Value::String(message.into())));
    }

    pub fn send(&self, status: Status) {
        // A SendError only means there are no subscribers.
        let _ = self.sender.send(status);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Status> {
        self.sender.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{ScriptEvent, WorkerEvent};
    use fsim_protocol::Outcome;

    #[tokio::test]
    async fn publish_wraps_in_ok_status() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        bus.publish(ScriptEvent::Success { script_id: 3 });

        let status = rx.recv().await.expect("should receive the notification");
        assert_eq!(status.outcome, Outcome::Ok);
        assert_eq!(status.payload["script_status"], "success");
        assert_eq!(status.payload["script_id"], 3);
    }

    #[tokio::test]
    async fn errors_are_plain_strings() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        bus.publish_error("Received log from unknown program!");

        let status = rx.recv().await.expect("should receive the error");
        assert_eq!(status.outcome, Outcome::Err);
        assert_eq!(status.payload, "Received log from unknown program!");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_notification() {
        let bus = NotificationBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(WorkerEvent::Connected { sid: 1 });

        let s1 = rx1.recv().await.expect("subscriber 1 should receive");
        let s2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(s1, s2);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = NotificationBus::default();
        bus.publish(WorkerEvent::Disconnected { sid: 1 });
    }
}
