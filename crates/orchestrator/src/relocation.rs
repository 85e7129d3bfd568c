//! Filesystem relocation planner.
//!
//! Before a move is issued the planner looks for a moved relocation that
//! already occupies the same destination on the worker. If one exists the
//! worker gets a chain `[restore(occupant), move(target)]` instead of a
//! plain move.

use fsim_core::error::CoreError;
use fsim_core::relocation::{find_conflict, RelocationRecord};
use fsim_core::store::{RelocationStore, WorkerStore};
use fsim_core::types::DbId;
use fsim_core::worker::Worker;
use fsim_protocol::Command;

use crate::context::EngineContext;

/// What a move turned into on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovePlan {
    Move(Command),
    /// Restore of the occupant, then the move.
    RestoreThenMove {
        occupant_id: DbId,
        restore: Command,
        mv: Command,
    },
}

async fn online_worker(
    ctx: &EngineContext,
    record: &RelocationRecord,
    action: &'static str,
) -> Result<Worker, CoreError> {
    let worker = ctx
        .store
        .get_worker(record.worker_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "worker",
            id: record.worker_id,
        })?;
    if !worker.online {
        return Err(CoreError::WorkerOffline {
            action,
            kind: "filesystem",
            name: record.name.clone(),
            worker: worker.name,
        });
    }
    Ok(worker)
}

/// Compute the commands that move `record` into place.
pub fn plan_move(
    record: &RelocationRecord,
    moved_on_worker: &[RelocationRecord],
) -> Result<MovePlan, CoreError> {
    let mv = Command::filesystem_move(record);
    Ok(match find_conflict(record, moved_on_worker)? {
        Some(occupant) => MovePlan::RestoreThenMove {
            occupant_id: occupant.id,
            restore: Command::filesystem_restore(occupant),
            mv,
        },
        None => MovePlan::Move(mv),
    })
}

/// Move `record` on its worker, restoring a conflicting relocation first.
pub async fn move_relocation(
    ctx: &EngineContext,
    record: &RelocationRecord,
) -> Result<MovePlan, CoreError> {
    let worker = online_worker(ctx, record, "move").await?;
    if record.is_moved() {
        return Err(CoreError::relocation_already_moved(&record.name, &worker.name));
    }

    let moved = ctx.store.moved_relocations_for_worker(worker.id).await?;
    let plan = plan_move(record, &moved)?;

    let outgoing = match &plan {
        MovePlan::Move(mv) => {
            ctx.store.set_relocation_command(record.id, mv.id).await?;
            mv.clone()
        }
        MovePlan::RestoreThenMove {
            occupant_id,
            restore,
            mv,
        } => {
            tracing::info!(
                relocation_id = record.id,
                occupant_id,
                "Destination occupied, restoring occupant first",
            );
            ctx.store.set_relocation_command(*occupant_id, restore.id).await?;
            ctx.store.set_relocation_command(record.id, mv.id).await?;
            Command::chain(vec![restore.clone(), mv.clone()])
        }
    };

    ctx.commands.send(worker.id, &outgoing).await?;
    tracing::info!(relocation_id = record.id, worker_id = worker.id, "Move issued");
    Ok(plan)
}

/// Restore a moved `record`.
pub async fn restore_relocation(
    ctx: &EngineContext,
    record: &RelocationRecord,
) -> Result<Command, CoreError> {
    let worker = online_worker(ctx, record, "restore").await?;
    if !record.is_moved() {
        return Err(CoreError::relocation_not_moved(&record.name, &worker.name));
    }

    let cmd = Command::filesystem_restore(record);
    ctx.store.set_relocation_command(record.id, cmd.id).await?;
    ctx.commands.send(worker.id, &cmd).await?;
    tracing::info!(relocation_id = record.id, worker_id = worker.id, "Restore issued");
    Ok(cmd)
}

/// Delete `record`. Refused while it is moved.
///
/// The store only deletes an unmoved record, so a move reply landing after
/// `record` was loaded still blocks the delete.
pub async fn delete_relocation(
    ctx: &EngineContext,
    record: &RelocationRecord,
) -> Result<(), CoreError> {
    if !record.is_moved() && ctx.store.delete_relocation(record.id).await? {
        tracing::info!(relocation_id = record.id, "Filesystem deleted");
        return Ok(());
    }

    match ctx.store.get_relocation(record.id).await? {
        Some(current) if current.is_moved() => {
            let worker = ctx
                .store
                .get_worker(current.worker_id)
                .await?
                .map(|w| w.name)
                .unwrap_or_default();
            Err(CoreError::relocation_still_moved(&current.name, &worker))
        }
        _ => Err(CoreError::NotFound {
            entity: "filesystem",
            id: record.id,
        }),
    }
}
