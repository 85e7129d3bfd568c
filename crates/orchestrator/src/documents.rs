//! Script export and import.
//!
//! Import resolves every reference before writing anything, so a document
//! naming an unknown worker, program or filesystem leaves no half-built
//! script behind.

use fsim_core::error::CoreError;
use fsim_core::program::Program;
use fsim_core::relocation::RelocationRecord;
use fsim_core::script::{EntryTarget, Script};
use fsim_core::script_document::{
    EntityRef, FilesystemRef, ProgramRef, RefStyle, ScriptDocument,
};
use fsim_core::store::{ProgramStore, RelocationStore, ScriptStore, WorkerStore};
use fsim_core::types::{DbId, StepIndex};
use fsim_core::worker::Worker;

use crate::context::EngineContext;

/// Describe `script_id`, naming workers with `workers` and programs and
/// filesystems with `targets`.
pub async fn export_script(
    ctx: &EngineContext,
    script_id: DbId,
    workers: RefStyle,
    targets: RefStyle,
) -> Result<ScriptDocument, CoreError> {
    let script = ctx
        .store
        .get_script(script_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "script",
            id: script_id,
        })?;

    let mut doc = ScriptDocument {
        name: script.name,
        programs: Vec::new(),
        filesystems: Vec::new(),
    };
    for entry in ctx.store.script_entries(script_id).await? {
        match entry.target {
            EntryTarget::Program(id) => {
                let program = ctx
                    .store
                    .get_program(id)
                    .await?
                    .ok_or(CoreError::NotFound { entity: "program", id })?;
                let worker = load_worker(ctx, program.worker_id).await?;
                doc.programs.push(ProgramRef {
                    index: entry.index,
                    program: targets.pick(program.id, &program.name),
                    worker: workers.pick(worker.id, &worker.name),
                });
            }
            EntryTarget::Filesystem(id) => {
                let record = ctx.store.get_relocation(id).await?.ok_or(CoreError::NotFound {
                    entity: "filesystem",
                    id,
                })?;
                let worker = load_worker(ctx, record.worker_id).await?;
                doc.filesystems.push(FilesystemRef {
                    index: entry.index,
                    filesystem: targets.pick(record.id, &record.name),
                    worker: workers.pick(worker.id, &worker.name),
                });
            }
        }
    }
    Ok(doc)
}

/// Create a new script from `doc`.
pub async fn import_script(ctx: &EngineContext, doc: &ScriptDocument) -> Result<Script, CoreError> {
    doc.validate()?;
    let workers = ctx.store.list_workers().await?;

    let mut entries: Vec<(StepIndex, EntryTarget)> = Vec::new();
    for entry in &doc.programs {
        let worker = resolve_worker(&workers, &entry.worker)?;
        let programs = ctx.store.programs_for_worker(worker.id).await?;
        let program = find_program(&programs, &entry.program, worker)?;
        entries.push((entry.index, EntryTarget::Program(program.id)));
    }
    for entry in &doc.filesystems {
        let worker = resolve_worker(&workers, &entry.worker)?;
        let records = ctx.store.relocations_for_worker(worker.id).await?;
        let record = find_relocation(&records, &entry.filesystem, worker)?;
        entries.push((entry.index, EntryTarget::Filesystem(record.id)));
    }

    let script = ctx.store.create_script(&doc.name).await?;
    for (index, target) in entries {
        ctx.store.add_entry(script.id, index, target).await?;
    }
    tracing::info!(script_id = script.id, name = %script.name, "Script imported");
    Ok(script)
}

async fn load_worker(ctx: &EngineContext, id: DbId) -> Result<Worker, CoreError> {
    ctx.store
        .get_worker(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "worker", id })
}

fn resolve_worker<'a>(workers: &'a [Worker], wanted: &EntityRef) -> Result<&'a Worker, CoreError> {
    workers
        .iter()
        .find(|w| wanted.matches(w.id, &w.name))
        .ok_or_else(|| CoreError::Validation(format!("Client `{wanted}` does not exist.")))
}

fn find_program<'a>(
    programs: &'a [Program],
    wanted: &EntityRef,
    worker: &Worker,
) -> Result<&'a Program, CoreError> {
    programs
        .iter()
        .find(|p| wanted.matches(p.id, &p.name))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Program `{wanted}` does not exist on client `{}`.",
                worker.name
            ))
        })
}

fn find_relocation<'a>(
    records: &'a [RelocationRecord],
    wanted: &EntityRef,
    worker: &Worker,
) -> Result<&'a RelocationRecord, CoreError> {
    records
        .iter()
        .find(|r| wanted.matches(r.id, &r.name))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Filesystem `{wanted}` does not exist on client `{}`.",
                worker.name
            ))
        })
}
