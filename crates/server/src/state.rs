use std::sync::Arc;

use fsim_core::store::Store;
use fsim_events::NotificationBus;
use fsim_orchestrator::{ChannelHub, Engine, WorkerWaker};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn Store>,
    /// Present when running against PostgreSQL.
    pub pool: Option<fsim_db::DbPool>,
    /// Command channels of connected workers.
    pub hub: Arc<ChannelHub>,
    pub bus: Arc<NotificationBus>,
    pub engine: Arc<Engine>,
}

impl AppState {
    /// Wire the engine to a fresh hub and bus.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn Store>,
        pool: Option<fsim_db::DbPool>,
        waker: Arc<dyn WorkerWaker>,
    ) -> Self {
        let hub = Arc::new(ChannelHub::new());
        let bus = Arc::new(NotificationBus::default());
        let engine = Arc::new(Engine::new(
            Arc::clone(&store),
            hub.clone(),
            Arc::clone(&bus),
            waker,
            config.orchestrator(),
        ));
        Self {
            config: Arc::new(config),
            store,
            pool,
            hub,
            bus,
            engine,
        }
    }
}
