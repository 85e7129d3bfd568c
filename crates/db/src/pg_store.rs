//! [`Store`](fsim_core::store::Store) implementation over PostgreSQL.

use async_trait::async_trait;
use fsim_core::error::CoreError;
use fsim_core::program::{CreateProgram, Program, ProgramRun};
use fsim_core::relocation::{CreateRelocation, RelocationRecord};
use fsim_core::script::{EntryTarget, Script, ScriptEntry};
use fsim_core::store::{
    ProgramStore, RelocationStore, ScriptStore, StoreResult, WorkerStore,
};
use fsim_core::types::{DbId, StepIndex};
use fsim_core::worker::{CreateWorker, Worker};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::relocation::RelocationRow;
use crate::repositories::{ProgramRepo, RelocationRepo, ScriptRepo, WorkerRepo};

/// Entity store backed by a connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_err(e: sqlx::Error) -> CoreError {
    tracing::error!(error = %e, "Database query failed");
    CoreError::Store(e.to_string())
}

fn relocation(row: Option<RelocationRow>) -> StoreResult<Option<RelocationRecord>> {
    row.map(RelocationRecord::try_from).transpose()
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

#[async_trait]
impl WorkerStore for PgStore {
    async fn create_worker(&self, input: &CreateWorker) -> StoreResult<Worker> {
        input.validate()?;
        let row = WorkerRepo::create(&self.pool, input).await.map_err(store_err)?;
        Ok(row.into())
    }

    async fn get_worker(&self, id: DbId) -> StoreResult<Option<Worker>> {
        let row = WorkerRepo::find_by_id(&self.pool, id).await.map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn list_workers(&self) -> StoreResult<Vec<Worker>> {
        let rows = WorkerRepo::list(&self.pool).await.map_err(store_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_worker_by_ip(&self, ip_address: &str) -> StoreResult<Option<Worker>> {
        let row = WorkerRepo::find_by_ip(&self.pool, ip_address)
            .await
            .map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_worker_by_command(&self, command_id: Uuid) -> StoreResult<Option<Worker>> {
        let row = WorkerRepo::find_by_command(&self.pool, command_id)
            .await
            .map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn set_worker_command(&self, id: DbId, command_id: Uuid) -> StoreResult<()> {
        WorkerRepo::set_command(&self.pool, id, command_id)
            .await
            .map_err(store_err)
    }

    async fn set_worker_online(&self, command_id: Uuid) -> StoreResult<Option<Worker>> {
        let row = WorkerRepo::set_online(&self.pool, command_id)
            .await
            .map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn set_worker_offline(&self, id: DbId) -> StoreResult<bool> {
        WorkerRepo::set_offline(&self.pool, id).await.map_err(store_err)
    }
}

// ---------------------------------------------------------------------------
// Programs
// ---------------------------------------------------------------------------

#[async_trait]
impl ProgramStore for PgStore {
    async fn create_program(&self, input: &CreateProgram) -> StoreResult<Program> {
        let row = ProgramRepo::create(&self.pool, input).await.map_err(store_err)?;
        Ok(row.into())
    }

    async fn get_program(&self, id: DbId) -> StoreResult<Option<Program>> {
        let row = ProgramRepo::find_by_id(&self.pool, id).await.map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn programs_for_worker(&self, worker_id: DbId) -> StoreResult<Vec<Program>> {
        let rows = ProgramRepo::list_for_worker(&self.pool, worker_id)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_run(&self, program_id: DbId) -> StoreResult<Option<ProgramRun>> {
        let row = ProgramRepo::find_run(&self.pool, program_id)
            .await
            .map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_run_by_command(&self, command_id: Uuid) -> StoreResult<Option<ProgramRun>> {
        let row = ProgramRepo::find_run_by_command(&self.pool, command_id)
            .await
            .map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn replace_run(&self, run: &ProgramRun) -> StoreResult<()> {
        ProgramRepo::upsert_run(&self.pool, run).await.map_err(store_err)
    }

    async fn delete_run(&self, program_id: DbId, command_id: Uuid) -> StoreResult<bool> {
        ProgramRepo::delete_run(&self.pool, program_id, command_id)
            .await
            .map_err(store_err)
    }

    async fn finish_run(&self, command_id: Uuid, code: &str) -> StoreResult<Option<ProgramRun>> {
        let row = ProgramRepo::finish_run(&self.pool, command_id, code)
            .await
            .map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn mark_run_timed_out(&self, command_id: Uuid) -> StoreResult<bool> {
        ProgramRepo::mark_timed_out(&self.pool, command_id)
            .await
            .map_err(store_err)
    }

    async fn delete_runs_for_worker(&self, worker_id: DbId) -> StoreResult<Vec<ProgramRun>> {
        let rows = ProgramRepo::delete_runs_for_worker(&self.pool, worker_id)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// Relocations
// ---------------------------------------------------------------------------

#[async_trait]
impl RelocationStore for PgStore {
    async fn create_relocation(&self, input: &CreateRelocation) -> StoreResult<RelocationRecord> {
        let row = RelocationRepo::create(&self.pool, input)
            .await
            .map_err(store_err)?;
        row.try_into()
    }

    async fn get_relocation(&self, id: DbId) -> StoreResult<Option<RelocationRecord>> {
        relocation(
            RelocationRepo::find_by_id(&self.pool, id)
                .await
                .map_err(store_err)?,
        )
    }

    async fn delete_relocation(&self, id: DbId) -> StoreResult<bool> {
        RelocationRepo::delete_unmoved(&self.pool, id)
            .await
            .map_err(store_err)
    }

    async fn relocations_for_worker(&self, worker_id: DbId) -> StoreResult<Vec<RelocationRecord>> {
        RelocationRepo::list_for_worker(&self.pool, worker_id)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(RelocationRecord::try_from)
            .collect()
    }

    async fn moved_relocations_for_worker(
        &self,
        worker_id: DbId,
    ) -> StoreResult<Vec<RelocationRecord>> {
        RelocationRepo::list_moved_for_worker(&self.pool, worker_id)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(RelocationRecord::try_from)
            .collect()
    }

    async fn find_relocation_by_command(
        &self,
        command_id: Uuid,
    ) -> StoreResult<Option<RelocationRecord>> {
        relocation(
            RelocationRepo::find_by_command(&self.pool, command_id)
                .await
                .map_err(store_err)?,
        )
    }

    async fn set_relocation_command(&self, id: DbId, command_id: Uuid) -> StoreResult<()> {
        RelocationRepo::set_command(&self.pool, id, command_id)
            .await
            .map_err(store_err)
    }

    async fn mark_relocation_moved(
        &self,
        command_id: Uuid,
        content_hash: &str,
    ) -> StoreResult<Option<RelocationRecord>> {
        relocation(
            RelocationRepo::mark_moved(&self.pool, command_id, content_hash)
                .await
                .map_err(store_err)?,
        )
    }

    async fn mark_relocation_restored(
        &self,
        command_id: Uuid,
    ) -> StoreResult<Option<RelocationRecord>> {
        relocation(
            RelocationRepo::mark_restored(&self.pool, command_id)
                .await
                .map_err(store_err)?,
        )
    }

    async fn mark_relocation_error(
        &self,
        command_id: Uuid,
        error: &str,
    ) -> StoreResult<Option<RelocationRecord>> {
        relocation(
            RelocationRepo::mark_error(&self.pool, command_id, error)
                .await
                .map_err(store_err)?,
        )
    }
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

#[async_trait]
impl ScriptStore for PgStore {
    async fn create_script(&self, name: &str) -> StoreResult<Script> {
        let row = ScriptRepo::create(&self.pool, name).await.map_err(store_err)?;
        Ok(row.into())
    }

    async fn get_script(&self, id: DbId) -> StoreResult<Option<Script>> {
        let row = ScriptRepo::find_by_id(&self.pool, id).await.map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn add_entry(
        &self,
        script_id: DbId,
        index: StepIndex,
        target: EntryTarget,
    ) -> StoreResult<ScriptEntry> {
        if index < 0 {
            return Err(CoreError::Validation(format!(
                "Script entry index must not be negative, got {index}"
            )));
        }
        match target {
            EntryTarget::Program(id) => ScriptRepo::add_program(&self.pool, script_id, index, id).await,
            EntryTarget::Filesystem(id) => {
                ScriptRepo::add_filesystem(&self.pool, script_id, index, id).await
            }
        }
        .map_err(store_err)?;
        Ok(ScriptEntry {
            script_id,
            index,
            target,
        })
    }

    async fn script_entries(&self, script_id: DbId) -> StoreResult<Vec<ScriptEntry>> {
        let rows = ScriptRepo::list_entries(&self.pool, script_id)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_script_started(&self, id: DbId) -> StoreResult<()> {
        ScriptRepo::mark_started(&self.pool, id).await.map_err(store_err)
    }

    async fn set_current_index(&self, id: DbId, index: StepIndex) -> StoreResult<()> {
        ScriptRepo::set_current_index(&self.pool, id, index)
            .await
            .map_err(store_err)
    }

    async fn finish_script(&self, id: DbId, error: Option<&str>) -> StoreResult<()> {
        ScriptRepo::finish(&self.pool, id, error).await.map_err(store_err)
    }
}
