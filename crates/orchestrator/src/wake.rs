//! Wake-up channel of the orchestrator.
//!
//! Anything that may change the outcome of the current step (a reply, a
//! timer, a worker coming or going) posts a [`Wake`] here instead of
//! touching run state. The run task drains the channel and re-evaluates
//! once per drain.
//!
//! The channel is bounded. A full queue already guarantees a re-evaluation,
//! so [`WakeHandle::post`] drops the wake instead of growing the queue while
//! no run is draining it. Only the connect timer needs its wake delivered and
//! uses [`WakeHandle::post_reliable`].

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Wakes queued beyond this are coalesced into the ones already waiting.
pub const WAKE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    WorkerOnline,
    CommandReply,
    Notify,
    /// Fired by the connect timer of the run with this generation.
    ConnectTimeout { generation: u64 },
    StopRequested,
}

pub type WakeReceiver = mpsc::Receiver<Wake>;

/// Cloneable, non-blocking sender half of the wake channel.
#[derive(Debug, Clone)]
pub struct WakeHandle {
    tx: mpsc::Sender<Wake>,
}

impl WakeHandle {
    pub fn channel() -> (Self, WakeReceiver) {
        let (tx, rx) = mpsc::channel(WAKE_CAPACITY);
        (Self { tx }, rx)
    }

    /// Queue `wake` unless the queue is full. Never blocks.
    pub fn post(&self, wake: Wake) {
        match self.tx.try_send(wake) {
            Ok(()) => {}
            Err(TrySendError::Full(wake)) => {
                tracing::trace!(?wake, "Wake queue full, coalescing");
            }
            // The receiver lives as long as the orchestrator.
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Queue `wake`, waiting for room when the queue is full.
    pub async fn post_reliable(&self, wake: Wake) {
        let _ = self.tx.send(wake).await;
    }

    pub fn notify(&self) {
        self.post(Wake::Notify);
    }
}
