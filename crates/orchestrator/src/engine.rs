//! Caller-facing engine API.
//!
//! [`Engine`] owns the [`Orchestrator`] and the shared [`EngineContext`] and
//! exposes every operation by entity id, loading records from the store
//! before handing them to the component that acts on them.

use std::sync::Arc;

use fsim_core::error::CoreError;
use fsim_core::program::{Program, ProgramRun};
use fsim_core::relocation::RelocationRecord;
use fsim_core::script::Script;
use fsim_core::script_document::{RefStyle, ScriptDocument};
use fsim_core::store::{ProgramStore, RelocationStore, Store, WorkerStore};
use fsim_core::types::DbId;
use fsim_core::worker::Worker;
use fsim_events::NotificationBus;
use fsim_protocol::{Command, Status};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::context::EngineContext;
use crate::hub::CommandSink;
use crate::programs::{self, LogRequest};
use crate::relocation::{self, MovePlan};
use crate::scheduler::{Orchestrator, RunPhase};
use crate::wake::WakeHandle;
use crate::wol::WorkerWaker;
use crate::{connections, documents, power, replies};

pub struct Engine {
    ctx: EngineContext,
    orchestrator: Orchestrator,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        commands: Arc<dyn CommandSink>,
        bus: Arc<NotificationBus>,
        waker: Arc<dyn WorkerWaker>,
        config: OrchestratorConfig,
    ) -> Self {
        let (wake, wake_rx) = WakeHandle::channel();
        let ctx = EngineContext {
            store,
            commands,
            bus,
            waker,
            wake,
            cancel: CancellationToken::new(),
        };
        let orchestrator = Orchestrator::new(ctx.clone(), wake_rx, config);
        Self { ctx, orchestrator }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    // ── Scripts ──────────────────────────────────────────────────────

    /// Start a script run. `Ok(false)` when another run is active.
    pub async fn start_script(&self, script_id: DbId) -> Result<bool, CoreError> {
        self.orchestrator.start(script_id).await
    }

    pub async fn stop_script(&self) -> bool {
        self.orchestrator.stop().await
    }

    pub async fn is_running(&self) -> bool {
        self.orchestrator.is_running().await
    }

    pub fn phase(&self) -> Option<RunPhase> {
        self.orchestrator.phase()
    }

    pub async fn export_script(
        &self,
        script_id: DbId,
        workers: RefStyle,
        targets: RefStyle,
    ) -> Result<ScriptDocument, CoreError> {
        documents::export_script(&self.ctx, script_id, workers, targets).await
    }

    pub async fn import_script(&self, doc: &ScriptDocument) -> Result<Script, CoreError> {
        documents::import_script(&self.ctx, doc).await
    }

    /// Ask the active run to re-evaluate.
    pub fn notify(&self) {
        self.ctx.wake.notify();
    }

    // ── Programs ─────────────────────────────────────────────────────

    pub async fn start_program(&self, program_id: DbId) -> Result<Uuid, CoreError> {
        let program = self.program(program_id).await?;
        programs::start_program(&self.ctx, &program).await
    }

    pub async fn stop_program(&self, program_id: DbId) -> Result<(), CoreError> {
        let program = self.program(program_id).await?;
        programs::stop_program(&self.ctx, &program).await
    }

    pub async fn request_log(&self, program_id: DbId, request: LogRequest) -> Result<(), CoreError> {
        let program = self.program(program_id).await?;
        programs::request_log(&self.ctx, &program, request).await
    }

    async fn program(&self, id: DbId) -> Result<Program, CoreError> {
        self.ctx
            .store
            .get_program(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "program", id })
    }

    // ── Relocations ──────────────────────────────────────────────────

    pub async fn move_relocation(&self, relocation_id: DbId) -> Result<MovePlan, CoreError> {
        let record = self.relocation(relocation_id).await?;
        relocation::move_relocation(&self.ctx, &record).await
    }

    pub async fn restore_relocation(&self, relocation_id: DbId) -> Result<Command, CoreError> {
        let record = self.relocation(relocation_id).await?;
        relocation::restore_relocation(&self.ctx, &record).await
    }

    pub async fn delete_relocation(&self, relocation_id: DbId) -> Result<(), CoreError> {
        let record = self.relocation(relocation_id).await?;
        relocation::delete_relocation(&self.ctx, &record).await
    }

    async fn relocation(&self, id: DbId) -> Result<RelocationRecord, CoreError> {
        self.ctx
            .store
            .get_relocation(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "filesystem",
                id,
            })
    }

    // ── Workers ──────────────────────────────────────────────────────

    pub async fn wake_worker(&self, worker_id: DbId) -> Result<(), CoreError> {
        let worker = self.worker(worker_id).await?;
        power::wake_worker(&self.ctx, &worker).await
    }

    pub async fn shutdown_worker(&self, worker_id: DbId) -> Result<Command, CoreError> {
        let worker = self.worker(worker_id).await?;
        power::shutdown_worker(&self.ctx, &worker).await
    }

    async fn worker(&self, id: DbId) -> Result<Worker, CoreError> {
        self.ctx
            .store
            .get_worker(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "worker", id })
    }

    // ── Worker transport ─────────────────────────────────────────────

    pub async fn worker_connected(&self, worker: &Worker) -> Result<Uuid, CoreError> {
        connections::worker_connected(&self.ctx, worker).await
    }

    pub async fn worker_disconnected(&self, worker_id: DbId) -> Result<Vec<ProgramRun>, CoreError> {
        connections::worker_disconnected(&self.ctx, worker_id).await
    }

    pub async fn process_text(&self, text: &str) {
        replies::process_text(&self.ctx, text).await;
    }

    pub async fn process_status(&self, status: Status) {
        replies::process_status(&self.ctx, status).await;
    }

    /// Stop the active run and cancel every pending timer.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down engine");
        self.orchestrator.stop().await;
        self.ctx.cancel.cancel();
    }
}
