//! Persistence seams consumed by the orchestration engine.
//!
//! Every liveness or completion update is a conditional update on the
//! expected pre-terminal condition (matching command id, still running),
//! so a late reply or timer can never overwrite a terminal record. The
//! conditional methods report whether they applied.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CoreError;
use crate::program::{CreateProgram, Program, ProgramRun};
use crate::relocation::{CreateRelocation, RelocationRecord};
use crate::script::{EntryTarget, Script, ScriptEntry};
use crate::types::{DbId, StepIndex};
use crate::worker::{CreateWorker, Worker};

pub type StoreResult<T> = Result<T, CoreError>;

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WorkerStore: Send + Sync {
    async fn create_worker(&self, input: &CreateWorker) -> StoreResult<Worker>;

    async fn get_worker(&self, id: DbId) -> StoreResult<Option<Worker>>;

    async fn list_workers(&self) -> StoreResult<Vec<Worker>>;

    async fn find_worker_by_ip(&self, ip_address: &str) -> StoreResult<Option<Worker>>;

    async fn find_worker_by_command(&self, command_id: Uuid) -> StoreResult<Option<Worker>>;

    /// Store the id of the pending `online` handshake.
    async fn set_worker_command(&self, id: DbId, command_id: Uuid) -> StoreResult<()>;

    /// Mark the worker owning `command_id` online. Returns the updated
    /// worker, or `None` when no worker waits on that id.
    async fn set_worker_online(&self, command_id: Uuid) -> StoreResult<Option<Worker>>;

    /// Mark offline and clear the pending command. Returns `true` when the
    /// worker was online.
    async fn set_worker_offline(&self, id: DbId) -> StoreResult<bool>;
}

// ---------------------------------------------------------------------------
// Programs and runs
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ProgramStore: Send + Sync {
    async fn create_program(&self, input: &CreateProgram) -> StoreResult<Program>;

    async fn get_program(&self, id: DbId) -> StoreResult<Option<Program>>;

    async fn programs_for_worker(&self, worker_id: DbId) -> StoreResult<Vec<Program>>;

    async fn get_run(&self, program_id: DbId) -> StoreResult<Option<ProgramRun>>;

    async fn find_run_by_command(&self, command_id: Uuid) -> StoreResult<Option<ProgramRun>>;

    /// Insert `run`, replacing any previous run of the same program.
    async fn replace_run(&self, run: &ProgramRun) -> StoreResult<()>;

    /// Delete the run of `program_id` if it still carries `command_id`.
    async fn delete_run(&self, program_id: DbId, command_id: Uuid) -> StoreResult<bool>;

    /// Record the terminal result of a still-running run.
    async fn finish_run(&self, command_id: Uuid, code: &str) -> StoreResult<Option<ProgramRun>>;

    /// Flag a still-running run as timed out.
    async fn mark_run_timed_out(&self, command_id: Uuid) -> StoreResult<bool>;

    /// Delete every run of programs located on `worker_id`, returning them.
    async fn delete_runs_for_worker(&self, worker_id: DbId) -> StoreResult<Vec<ProgramRun>>;
}

// ---------------------------------------------------------------------------
// Relocations
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RelocationStore: Send + Sync {
    async fn create_relocation(&self, input: &CreateRelocation) -> StoreResult<RelocationRecord>;

    async fn get_relocation(&self, id: DbId) -> StoreResult<Option<RelocationRecord>>;

    /// Delete the record unless it is moved. Returns `false` when nothing
    /// was deleted, either because the record is gone or still moved.
    async fn delete_relocation(&self, id: DbId) -> StoreResult<bool>;

    async fn relocations_for_worker(&self, worker_id: DbId) -> StoreResult<Vec<RelocationRecord>>;

    async fn moved_relocations_for_worker(
        &self,
        worker_id: DbId,
    ) -> StoreResult<Vec<RelocationRecord>>;

    async fn find_relocation_by_command(
        &self,
        command_id: Uuid,
    ) -> StoreResult<Option<RelocationRecord>>;

    /// Attach a freshly issued command and clear `last_error`.
    async fn set_relocation_command(&self, id: DbId, command_id: Uuid) -> StoreResult<()>;

    /// Apply a successful move reply to the record awaiting `command_id`.
    async fn mark_relocation_moved(
        &self,
        command_id: Uuid,
        content_hash: &str,
    ) -> StoreResult<Option<RelocationRecord>>;

    /// Apply a successful restore reply to the record awaiting `command_id`.
    async fn mark_relocation_restored(
        &self,
        command_id: Uuid,
    ) -> StoreResult<Option<RelocationRecord>>;

    /// Apply a failed move/restore reply to the record awaiting `command_id`.
    async fn mark_relocation_error(
        &self,
        command_id: Uuid,
        error: &str,
    ) -> StoreResult<Option<RelocationRecord>>;
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ScriptStore: Send + Sync {
    async fn create_script(&self, name: &str) -> StoreResult<Script>;

    async fn get_script(&self, id: DbId) -> StoreResult<Option<Script>>;

    async fn add_entry(
        &self,
        script_id: DbId,
        index: StepIndex,
        target: EntryTarget,
    ) -> StoreResult<ScriptEntry>;

    /// All entries, ordered by index with programs before filesystems.
    async fn script_entries(&self, script_id: DbId) -> StoreResult<Vec<ScriptEntry>>;

    /// Reset run bookkeeping: running, initialized, index `-1`, no error.
    async fn mark_script_started(&self, id: DbId) -> StoreResult<()>;

    async fn set_current_index(&self, id: DbId, index: StepIndex) -> StoreResult<()>;

    /// Persist the end of a run. `last_ran` is set only when `error` is `None`.
    async fn finish_script(&self, id: DbId, error: Option<&str>) -> StoreResult<()>;

    async fn script_indexes(&self, script_id: DbId) -> StoreResult<Vec<StepIndex>> {
        let mut indexes: Vec<StepIndex> = self
            .script_entries(script_id)
            .await?
            .into_iter()
            .map(|e| e.index)
            .collect();
        indexes.sort_unstable();
        indexes.dedup();
        Ok(indexes)
    }

    async fn entries_at(&self, script_id: DbId, index: StepIndex) -> StoreResult<Vec<ScriptEntry>> {
        Ok(self
            .script_entries(script_id)
            .await?
            .into_iter()
            .filter(|e| e.index == index)
            .collect())
    }
}

/// Everything the engine needs from persistence.
pub trait Store: WorkerStore + ProgramStore + RelocationStore + ScriptStore {}

impl<T> Store for T where T: WorkerStore + ProgramStore + RelocationStore + ScriptStore {}
