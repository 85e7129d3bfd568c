use std::sync::Arc;

use fsim_core::store::Store;
use fsim_events::NotificationBus;
use tokio_util::sync::CancellationToken;

use crate::hub::CommandSink;
use crate::wake::WakeHandle;
use crate::wol::WorkerWaker;

/// Collaborators shared by every engine component.
///
/// Cheap to clone; all fields are handles.
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn Store>,
    pub commands: Arc<dyn CommandSink>,
    pub bus: Arc<NotificationBus>,
    pub waker: Arc<dyn WorkerWaker>,
    pub wake: WakeHandle,
    /// Cancelled on engine shutdown; parent of every timer and run token.
    pub cancel: CancellationToken,
}
