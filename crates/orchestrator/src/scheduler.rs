//! Script run state machine.
//!
//! One [`Orchestrator`] runs at most one script at a time on a dedicated
//! tokio task. The task owns the run state; everything else talks to it by
//! posting [`Wake`]s. Each drain of the wake channel triggers one
//! evaluation, which advances the run as far as it can go.
//!
//! ```text
//! Init -> WaitingForWorkers -> NextStep <-> WaitingForStep -> Success | Error
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fsim_core::error::CoreError;
use fsim_core::program::{Program, ProgramTimeout, RunOutcome};
use fsim_core::relocation::RelocationRecord;
use fsim_core::script::{next_index, split_entries, EntryTarget};
use fsim_core::store::{ProgramStore, RelocationStore, ScriptStore, WorkerStore};
use fsim_core::types::{DbId, StepIndex};
use fsim_core::worker::Worker;
use fsim_events::{Notification, ScriptEvent};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::OrchestratorConfig;
use crate::context::EngineContext;
use crate::programs::start_program;
use crate::relocation::move_relocation;
use crate::wake::{Wake, WakeReceiver};

/// Error code persisted for a run ended by [`Orchestrator::stop`].
pub const STOPPED_CODE: &str = "Script was stopped.";

/// Where the current or most recent run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    WaitingForWorkers,
    NextStep,
    WaitingForStep,
    Success,
    Error,
}

/// Result of one state machine transition.
enum Step {
    /// Evaluate again right away.
    Continue,
    /// Nothing to do until the next wake.
    Idle,
    /// The run is over.
    Done,
}

#[derive(Default)]
struct Control {
    task: Option<JoinHandle<()>>,
    stop: Option<CancellationToken>,
}

pub struct Orchestrator {
    ctx: EngineContext,
    config: OrchestratorConfig,
    control: Mutex<Control>,
    generation: AtomicU64,
    wake_rx: Arc<Mutex<WakeReceiver>>,
    phase: Arc<watch::Sender<Option<RunPhase>>>,
}

impl Orchestrator {
    pub fn new(ctx: EngineContext, wake_rx: WakeReceiver, config: OrchestratorConfig) -> Self {
        Self {
            ctx,
            config,
            control: Mutex::new(Control::default()),
            generation: AtomicU64::new(0),
            wake_rx: Arc::new(Mutex::new(wake_rx)),
            phase: Arc::new(watch::Sender::new(None)),
        }
    }

    /// Start running `script_id`.
    ///
    /// Returns `Ok(false)` without touching anything when a run is already
    /// active.
    pub async fn start(&self, script_id: DbId) -> Result<bool, CoreError> {
        let mut control = self.control.lock().await;
        if control.task.as_ref().is_some_and(|t| !t.is_finished()) {
            tracing::warn!(script_id, "Start rejected, a script is already running");
            return Ok(false);
        }

        self.ctx
            .store
            .get_script(script_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "script",
                id: script_id,
            })?;
        self.ctx.store.mark_script_started(script_id).await?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let stop = self.ctx.cancel.child_token();
        self.phase.send_replace(Some(RunPhase::Init));
        let run = RunTask {
            ctx: self.ctx.clone(),
            config: self.config,
            stop: stop.clone(),
            connect_timer: None,
            phase: Arc::clone(&self.phase),
            state: RunState {
                script_id,
                generation,
                current_index: -1,
                phase: RunPhase::Init,
                workers: Vec::new(),
                error_message: None,
            },
        };

        tracing::info!(script_id, generation, "Script run started");
        control.task = Some(tokio::spawn(run.run(Arc::clone(&self.wake_rx))));
        control.stop = Some(stop);
        Ok(true)
    }

    /// Stop the active run, waiting a bounded time for its task to end.
    ///
    /// Returns `true` when a run was active.
    pub async fn stop(&self) -> bool {
        let mut control = self.control.lock().await;
        let Some(mut task) = control.task.take() else {
            return false;
        };
        let active = !task.is_finished();
        if let Some(stop) = control.stop.take() {
            stop.cancel();
        }
        self.ctx.wake.post(Wake::StopRequested);

        match tokio::time::timeout(self.config.stop_join_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Script run task failed"),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.stop_join_timeout.as_millis() as u64,
                    "Script run did not stop in time",
                );
                control.task = Some(task);
            }
        }
        active
    }

    /// Phase of the active run, or the final phase of the last one.
    /// `None` before the first run.
    pub fn phase(&self) -> Option<RunPhase> {
        *self.phase.borrow()
    }

    pub async fn is_running(&self) -> bool {
        self.control
            .lock()
            .await
            .task
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

// ---------------------------------------------------------------------------
// Run task
// ---------------------------------------------------------------------------

struct RunState {
    script_id: DbId,
    generation: u64,
    current_index: StepIndex,
    phase: RunPhase,
    /// Workers referenced by any entry, in first-seen order.
    workers: Vec<DbId>,
    error_message: Option<String>,
}

struct RunTask {
    ctx: EngineContext,
    config: OrchestratorConfig,
    stop: CancellationToken,
    connect_timer: Option<CancellationToken>,
    phase: Arc<watch::Sender<Option<RunPhase>>>,
    state: RunState,
}

impl RunTask {
    async fn run(mut self, wake_rx: Arc<Mutex<WakeReceiver>>) {
        let mut rx = wake_rx.lock().await;
        // Wakes queued before this run are irrelevant to it.
        while rx.try_recv().is_ok() {}
        let stop = self.stop.clone();

        loop {
            if stop.is_cancelled() {
                self.stopped().await;
                return;
            }
            if self.drive().await {
                self.disarm_connect_timer();
                return;
            }

            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    self.stopped().await;
                    return;
                }
                wake = rx.recv() => {
                    let Some(wake) = wake else {
                        self.stopped().await;
                        return;
                    };
                    self.observe(wake);
                    while let Ok(wake) = rx.try_recv() {
                        self.observe(wake);
                    }
                }
            }
        }
    }

    /// Advance until the run idles or ends. Returns `true` once it ended.
    async fn drive(&mut self) -> bool {
        loop {
            match self.advance().await {
                Ok(Step::Continue) => {}
                Ok(Step::Idle) => return false,
                Ok(Step::Done) => return true,
                Err(e) => self.fail(e.to_string()),
            }
        }
    }

    fn observe(&mut self, wake: Wake) {
        if let Wake::ConnectTimeout { generation } = wake {
            if generation == self.state.generation
                && self.state.phase == RunPhase::WaitingForWorkers
            {
                let err = CoreError::RunTimeout(format!(
                    "Not all workers connected within {}.",
                    describe_duration(self.config.worker_connect_timeout)
                ));
                tracing::warn!(script_id = self.state.script_id, "Worker connect timeout");
                self.fail(err.to_string());
            }
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        self.state.phase = phase;
        self.phase.send_replace(Some(phase));
    }

    fn fail(&mut self, message: String) {
        tracing::error!(script_id = self.state.script_id, error = %message, "Script run failed");
        self.state.error_message = Some(message);
        self.enter(RunPhase::Error);
    }

    async fn advance(&mut self) -> Result<Step, CoreError> {
        let script_id = self.state.script_id;
        match self.state.phase {
            RunPhase::Init => {
                let workers = self.involved_workers().await?;
                for worker in &workers {
                    if let Err(e) = self.ctx.waker.wake(worker).await {
                        tracing::warn!(worker_id = worker.id, error = %e, "Failed to wake worker");
                    }
                    self.ctx.bus.publish(Notification::message(format!(
                        "Send start command to client `{}`",
                        worker.name
                    )));
                }
                self.state.workers = workers.iter().map(|w| w.id).collect();
                self.ctx.bus.publish(ScriptEvent::WaitingForSlaves { script_id });
                self.arm_connect_timer();
                self.enter(RunPhase::WaitingForWorkers);
                Ok(Step::Continue)
            }

            RunPhase::WaitingForWorkers => {
                for &worker_id in &self.state.workers {
                    if !self.load_worker(worker_id).await?.online {
                        return Ok(Step::Idle);
                    }
                }
                self.disarm_connect_timer();
                tracing::info!(script_id, "All workers online");
                self.enter(RunPhase::NextStep);
                Ok(Step::Continue)
            }

            RunPhase::NextStep => self.next_step().await,

            RunPhase::WaitingForStep => self.check_step().await,

            RunPhase::Success => {
                if let Err(e) = self.ctx.store.finish_script(script_id, None).await {
                    tracing::error!(script_id, error = %e, "Failed to persist script success");
                }
                tracing::info!(script_id, "Script run succeeded");
                self.ctx.bus.publish(ScriptEvent::Success { script_id });
                Ok(Step::Done)
            }

            RunPhase::Error => {
                let message = self.state.error_message.clone().unwrap_or_default();
                self.finish_with_error(message).await;
                Ok(Step::Done)
            }
        }
    }

    async fn next_step(&mut self) -> Result<Step, CoreError> {
        let script_id = self.state.script_id;
        let last_index = self.state.current_index;
        let indexes = self.ctx.store.script_indexes(script_id).await?;

        let Some(index) = next_index(&indexes, last_index) else {
            self.state.current_index = -1;
            self.ctx.store.set_current_index(script_id, -1).await?;
            self.ctx.bus.publish(ScriptEvent::NextStep {
                script_id,
                index: -1,
                last_index,
                start_time: 0,
            });
            self.enter(RunPhase::Success);
            return Ok(Step::Continue);
        };

        self.state.current_index = index;
        self.ctx.store.set_current_index(script_id, index).await?;
        let entries = self.ctx.store.entries_at(script_id, index).await?;
        let (programs, filesystems) = split_entries(&entries);

        let mut start_time = 0;
        for program_id in programs {
            let program = self.load_program(program_id).await?;
            start_program(&self.ctx, &program)
                .await
                .map_err(as_execute_error)?;
            if let ProgramTimeout::After(_) = program.timeout() {
                start_time = start_time.max(program.timeout_secs);
            }
        }
        for relocation_id in filesystems {
            let record = self.load_relocation(relocation_id).await?;
            if record.is_moved() {
                tracing::debug!(relocation_id, "Filesystem already moved, skipping");
                continue;
            }
            move_relocation(&self.ctx, &record)
                .await
                .map_err(as_execute_error)?;
        }

        tracing::info!(script_id, index, last_index, start_time, "Step dispatched");
        self.ctx.bus.publish(ScriptEvent::NextStep {
            script_id,
            index,
            last_index,
            start_time,
        });
        self.enter(RunPhase::WaitingForStep);
        Ok(Step::Continue)
    }

    /// Scan the entries of the current step. The first error wins.
    async fn check_step(&mut self) -> Result<Step, CoreError> {
        let entries = self
            .ctx
            .store
            .entries_at(self.state.script_id, self.state.current_index)
            .await?;

        let mut pending = false;
        for entry in entries {
            match entry.target {
                EntryTarget::Program(program_id) => {
                    let program = self.load_program(program_id).await?;
                    let outcome = self.ctx.store.get_run(program_id).await?.map(|r| r.outcome());
                    match outcome {
                        None | Some(RunOutcome::Failed(_)) => {
                            self.fail(format!("Program `{}` has an error.", program.name));
                            return Ok(Step::Continue);
                        }
                        Some(RunOutcome::InFlight) => pending = true,
                        Some(RunOutcome::TimedOut | RunOutcome::Succeeded) => {}
                    }
                }
                EntryTarget::Filesystem(relocation_id) => {
                    let record = self.load_relocation(relocation_id).await?;
                    if record.is_moved() {
                        continue;
                    }
                    if record.is_error() {
                        self.fail(format!("Filesystem `{}` has an error.", record.name));
                        return Ok(Step::Continue);
                    }
                    pending = true;
                }
            }
        }

        if pending {
            return Ok(Step::Idle);
        }
        self.enter(RunPhase::NextStep);
        Ok(Step::Continue)
    }

    async fn stopped(&mut self) {
        self.disarm_connect_timer();
        self.enter(RunPhase::Error);
        tracing::info!(script_id = self.state.script_id, "Script run stopped");
        self.finish_with_error(STOPPED_CODE.to_string()).await;
    }

    async fn finish_with_error(&mut self, message: String) {
        let script_id = self.state.script_id;
        if let Err(e) = self.ctx.store.finish_script(script_id, Some(&message)).await {
            tracing::error!(script_id, error = %e, "Failed to persist script error");
        }
        self.ctx.bus.publish(ScriptEvent::Error {
            script_id,
            error_code: message,
        });
    }

    fn arm_connect_timer(&mut self) {
        self.disarm_connect_timer();
        let token = self.stop.child_token();
        let wake = self.ctx.wake.clone();
        let generation = self.state.generation;
        let duration = self.config.worker_connect_timeout;
        let cancelled = token.clone();
        tokio::spawn(async move {
            let fire = async {
                tokio::time::sleep(duration).await;
                wake.post_reliable(Wake::ConnectTimeout { generation }).await;
            };
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = fire => {}
            }
        });
        self.connect_timer = Some(token);
    }

    fn disarm_connect_timer(&mut self) {
        if let Some(token) = self.connect_timer.take() {
            token.cancel();
        }
    }

    // ── Lookups ──────────────────────────────────────────────────────

    /// Distinct workers referenced by any entry of the script.
    async fn involved_workers(&self) -> Result<Vec<Worker>, CoreError> {
        let entries = self.ctx.store.script_entries(self.state.script_id).await?;
        let mut ids: Vec<DbId> = Vec::new();
        for entry in entries {
            let worker_id = match entry.target {
                EntryTarget::Program(id) => self.load_program(id).await?.worker_id,
                EntryTarget::Filesystem(id) => self.load_relocation(id).await?.worker_id,
            };
            if !ids.contains(&worker_id) {
                ids.push(worker_id);
            }
        }

        let mut workers = Vec::with_capacity(ids.len());
        for id in ids {
            workers.push(self.load_worker(id).await?);
        }
        Ok(workers)
    }

    async fn load_worker(&self, id: DbId) -> Result<Worker, CoreError> {
        self.ctx
            .store
            .get_worker(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "worker", id })
    }

    async fn load_program(&self, id: DbId) -> Result<Program, CoreError> {
        self.ctx
            .store
            .get_program(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "program", id })
    }

    async fn load_relocation(&self, id: DbId) -> Result<RelocationRecord, CoreError> {
        self.ctx
            .store
            .get_relocation(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "filesystem",
                id,
            })
    }
}

/// Offline failures during a step are reported as failed executions.
fn as_execute_error(err: CoreError) -> CoreError {
    match err {
        CoreError::WorkerOffline {
            kind, name, worker, ..
        } => CoreError::WorkerOffline {
            action: "execute",
            kind,
            name,
            worker,
        },
        other => other,
    }
}

/// Human wording of a timeout: whole minutes, else seconds, else millis.
fn describe_duration(d: Duration) -> String {
    fn plural(n: u128, unit: &str) -> String {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    }

    let millis = d.as_millis();
    if millis > 0 && millis % 60_000 == 0 {
        plural(millis / 60_000, "minute")
    } else if millis % 1000 == 0 {
        plural(millis / 1000, "second")
    } else {
        plural(millis, "millisecond")
    }
}
