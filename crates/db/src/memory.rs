//! In-process [`Store`](fsim_core::store::Store) used when no database is
//! configured, and by the engine's tests.

use std::collections::BTreeMap;

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
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    next_id: DbId,
    workers: BTreeMap<DbId, Worker>,
    programs: BTreeMap<DbId, Program>,
    /// Keyed by program id.
    runs: BTreeMap<DbId, ProgramRun>,
    relocations: BTreeMap<DbId, RelocationRecord>,
    scripts: BTreeMap<DbId, Script>,
    entries: Vec<ScriptEntry>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn relocation_by_command(&mut self, command_id: Uuid) -> Option<&mut RelocationRecord> {
        self.relocations
            .values_mut()
            .find(|r| r.command_id == Some(command_id))
    }

    fn run_by_command(&mut self, command_id: Uuid) -> Option<&mut ProgramRun> {
        self.runs.values_mut().find(|r| r.command_id == command_id)
    }
}

/// Entity store held entirely in memory behind one async mutex.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unique_violation(entity: &str, name: &str) -> CoreError {
    CoreError::Validation(format!("A {entity} named `{name}` already exists"))
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

#[async_trait]
impl WorkerStore for MemoryStore {
    async fn create_worker(&self, input: &CreateWorker) -> StoreResult<Worker> {
        input.validate()?;
        let mut state = self.state.lock().await;
        if state.workers.values().any(|w| {
            w.name == input.name
                || w.ip_address == input.ip_address
                || w.mac_address == input.mac_address
        }) {
            return Err(unique_violation("worker", &input.name));
        }
        let worker = Worker {
            id: state.next_id(),
            name: input.name.clone(),
            ip_address: input.ip_address.clone(),
            mac_address: input.mac_address.clone(),
            online: false,
            command_id: None,
        };
        state.workers.insert(worker.id, worker.clone());
        Ok(worker)
    }

    async fn get_worker(&self, id: DbId) -> StoreResult<Option<Worker>> {
        Ok(self.state.lock().await.workers.get(&id).cloned())
    }

    async fn list_workers(&self) -> StoreResult<Vec<Worker>> {
        Ok(self.state.lock().await.workers.values().cloned().collect())
    }

    async fn find_worker_by_ip(&self, ip_address: &str) -> StoreResult<Option<Worker>> {
        let state = self.state.lock().await;
        Ok(state
            .workers
            .values()
            .find(|w| w.ip_address == ip_address)
            .cloned())
    }

    async fn find_worker_by_command(&self, command_id: Uuid) -> StoreResult<Option<Worker>> {
        let state = self.state.lock().await;
        Ok(state
            .workers
            .values()
            .find(|w| w.command_id == Some(command_id))
            .cloned())
    }

    async fn set_worker_command(&self, id: DbId, command_id: Uuid) -> StoreResult<()> {
        if let Some(worker) = self.state.lock().await.workers.get_mut(&id) {
            worker.command_id = Some(command_id);
        }
        Ok(())
    }

    async fn set_worker_online(&self, command_id: Uuid) -> StoreResult<Option<Worker>> {
        let mut state = self.state.lock().await;
        Ok(state
            .workers
            .values_mut()
            .find(|w| w.command_id == Some(command_id))
            .map(|w| {
                w.online = true;
                w.clone()
            }))
    }

    async fn set_worker_offline(&self, id: DbId) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        Ok(match state.workers.get_mut(&id) {
            Some(worker) => {
                let was_online = worker.online;
                worker.online = false;
                worker.command_id = None;
                was_online
            }
            None => false,
        })
    }
}

// ---------------------------------------------------------------------------
// Programs
// ---------------------------------------------------------------------------

#[async_trait]
impl ProgramStore for MemoryStore {
    async fn create_program(&self, input: &CreateProgram) -> StoreResult<Program> {
        let mut state = self.state.lock().await;
        if !state.workers.contains_key(&input.worker_id) {
            return Err(CoreError::NotFound {
                entity: "worker",
                id: input.worker_id,
            });
        }
        if state
            .programs
            .values()
            .any(|p| p.worker_id == input.worker_id && p.name == input.name)
        {
            return Err(unique_violation("program", &input.name));
        }
        let program = Program {
            id: state.next_id(),
            name: input.name.clone(),
            worker_id: input.worker_id,
            path: input.path.clone(),
            arguments: input.arguments.clone(),
            timeout_secs: input.timeout_secs,
        };
        state.programs.insert(program.id, program.clone());
        Ok(program)
    }

    async fn get_program(&self, id: DbId) -> StoreResult<Option<Program>> {
        Ok(self.state.lock().await.programs.get(&id).cloned())
    }

    async fn programs_for_worker(&self, worker_id: DbId) -> StoreResult<Vec<Program>> {
        let state = self.state.lock().await;
        Ok(state
            .programs
            .values()
            .filter(|p| p.worker_id == worker_id)
            .cloned()
            .collect())
    }

    async fn get_run(&self, program_id: DbId) -> StoreResult<Option<ProgramRun>> {
        Ok(self.state.lock().await.runs.get(&program_id).cloned())
    }

    async fn find_run_by_command(&self, command_id: Uuid) -> StoreResult<Option<ProgramRun>> {
        let mut state = self.state.lock().await;
        Ok(state.run_by_command(command_id).map(|r| r.clone()))
    }

    async fn replace_run(&self, run: &ProgramRun) -> StoreResult<()> {
        self.state
            .lock()
            .await
            .runs
            .insert(run.program_id, run.clone());
        Ok(())
    }

    async fn delete_run(&self, program_id: DbId, command_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if state
            .runs
            .get(&program_id)
            .is_some_and(|r| r.command_id == command_id)
        {
            state.runs.remove(&program_id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn finish_run(&self, command_id: Uuid, code: &str) -> StoreResult<Option<ProgramRun>> {
        let mut state = self.state.lock().await;
        Ok(state
            .run_by_command(command_id)
            .filter(|r| r.running)
            .map(|r| {
                r.running = false;
                r.result_code = Some(code.to_string());
                r.clone()
            }))
    }

    async fn mark_run_timed_out(&self, command_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        Ok(match state.run_by_command(command_id) {
            Some(run) if run.running && !run.timed_out => {
                run.timed_out = true;
                true
            }
            _ => false,
        })
    }

    async fn delete_runs_for_worker(&self, worker_id: DbId) -> StoreResult<Vec<ProgramRun>> {
        let mut state = self.state.lock().await;
        let program_ids: Vec<DbId> = state
            .programs
            .values()
            .filter(|p| p.worker_id == worker_id)
            .map(|p| p.id)
            .collect();
        Ok(program_ids
            .iter()
            .filter_map(|id| state.runs.remove(id))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Relocations
// ---------------------------------------------------------------------------

#[async_trait]
impl RelocationStore for MemoryStore {
    async fn create_relocation(&self, input: &CreateRelocation) -> StoreResult<RelocationRecord> {
        let mut state = self.state.lock().await;
        if !state.workers.contains_key(&input.worker_id) {
            return Err(CoreError::NotFound {
                entity: "worker",
                id: input.worker_id,
            });
        }
        let record = RelocationRecord {
            id: state.next_id(),
            name: input.name.clone(),
            worker_id: input.worker_id,
            source_path: input.source_path.clone(),
            source_kind: input.source_kind,
            destination_path: input.destination_path.clone(),
            destination_kind: input.destination_kind,
            command_id: None,
            content_hash: None,
            last_error: None,
        };
        state.relocations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_relocation(&self, id: DbId) -> StoreResult<Option<RelocationRecord>> {
        Ok(self.state.lock().await.relocations.get(&id).cloned())
    }

    async fn delete_relocation(&self, id: DbId) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.relocations.get(&id) {
            Some(record) if !record.is_moved() => {}
            _ => return Ok(false),
        }
        let removed = state.relocations.remove(&id).is_some();
        if removed {
            state
                .entries
                .retain(|e| e.target != EntryTarget::Filesystem(id));
        }
        Ok(removed)
    }

    async fn relocations_for_worker(&self, worker_id: DbId) -> StoreResult<Vec<RelocationRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .relocations
            .values()
            .filter(|r| r.worker_id == worker_id)
            .cloned()
            .collect())
    }

    async fn moved_relocations_for_worker(
        &self,
        worker_id: DbId,
    ) -> StoreResult<Vec<RelocationRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .relocations
            .values()
            .filter(|r| r.worker_id == worker_id && r.is_moved())
            .cloned()
            .collect())
    }

    async fn find_relocation_by_command(
        &self,
        command_id: Uuid,
    ) -> StoreResult<Option<RelocationRecord>> {
        let mut state = self.state.lock().await;
        Ok(state.relocation_by_command(command_id).map(|r| r.clone()))
    }

    async fn set_relocation_command(&self, id: DbId, command_id: Uuid) -> StoreResult<()> {
        if let Some(record) = self.state.lock().await.relocations.get_mut(&id) {
            record.command_id = Some(command_id);
            record.last_error = None;
        }
        Ok(())
    }

    async fn mark_relocation_moved(
        &self,
        command_id: Uuid,
        content_hash: &str,
    ) -> StoreResult<Option<RelocationRecord>> {
        let mut state = self.state.lock().await;
        Ok(state.relocation_by_command(command_id).map(|r| {
            r.content_hash = Some(content_hash.to_string());
            r.last_error = None;
            r.clone()
        }))
    }

    async fn mark_relocation_restored(
        &self,
        command_id: Uuid,
    ) -> StoreResult<Option<RelocationRecord>> {
        let mut state = self.state.lock().await;
        Ok(state.relocation_by_command(command_id).map(|r| {
            r.content_hash = None;
            r.last_error = None;
            r.clone()
        }))
    }

    async fn mark_relocation_error(
        &self,
        command_id: Uuid,
        error: &str,
    ) -> StoreResult<Option<RelocationRecord>> {
        let mut state = self.state.lock().await;
        Ok(state.relocation_by_command(command_id).map(|r| {
            r.last_error = Some(error.to_string());
            r.clone()
        }))
    }
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

#[async_trait]
impl ScriptStore for MemoryStore {
    async fn create_script(&self, name: &str) -> StoreResult<Script> {
        let mut state = self.state.lock().await;
        if state.scripts.values().any(|s| s.name == name) {
            return Err(unique_violation("script", name));
        }
        let script = Script {
            id: state.next_id(),
            name: name.to_string(),
            last_ran: None,
            is_initialized: false,
            is_running: false,
            error_code: None,
            current_index: -1,
        };
        state.scripts.insert(script.id, script.clone());
        Ok(script)
    }

    async fn get_script(&self, id: DbId) -> StoreResult<Option<Script>> {
        Ok(self.state.lock().await.scripts.get(&id).cloned())
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
        let mut state = self.state.lock().await;
        if !state.scripts.contains_key(&script_id) {
            return Err(CoreError::NotFound {
                entity: "script",
                id: script_id,
            });
        }
        let target_exists = match target {
            EntryTarget::Program(id) => state.programs.contains_key(&id),
            EntryTarget::Filesystem(id) => state.relocations.contains_key(&id),
        };
        if !target_exists {
            let (entity, id) = match target {
                EntryTarget::Program(id) => ("program", id),
                EntryTarget::Filesystem(id) => ("filesystem", id),
            };
            return Err(CoreError::NotFound { entity, id });
        }
        let entry = ScriptEntry {
            script_id,
            index,
            target,
        };
        if !state.entries.contains(&entry) {
            state.entries.push(entry);
        }
        Ok(entry)
    }

    async fn script_entries(&self, script_id: DbId) -> StoreResult<Vec<ScriptEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<ScriptEntry> = state
            .entries
            .iter()
            .filter(|e| e.script_id == script_id)
            .copied()
            .collect();
        // Stable: keeps insertion order within (index, kind).
        entries.sort_by_key(|e| (e.index, matches!(e.target, EntryTarget::Filesystem(_))));
        Ok(entries)
    }

    async fn mark_script_started(&self, id: DbId) -> StoreResult<()> {
        if let Some(script) = self.state.lock().await.scripts.get_mut(&id) {
            script.is_running = true;
            script.is_initialized = true;
            script.current_index = -1;
            script.error_code = None;
        }
        Ok(())
    }

    async fn set_current_index(&self, id: DbId, index: StepIndex) -> StoreResult<()> {
        if let Some(script) = self.state.lock().await.scripts.get_mut(&id) {
            script.current_index = index;
        }
        Ok(())
    }

    async fn finish_script(&self, id: DbId, error: Option<&str>) -> StoreResult<()> {
        if let Some(script) = self.state.lock().await.scripts.get_mut(&id) {
            script.is_running = false;
            script.error_code = error.map(str::to_string);
            if error.is_none() {
                script.last_ran = Some(chrono::Utc::now());
            }
        }
        Ok(())
    }
}
