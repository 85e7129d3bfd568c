//! Worker connection lifecycle.

use fsim_core::error::CoreError;
use fsim_core::program::{ProgramRun, DISCONNECTED_CODE};
use fsim_core::store::{ProgramStore, WorkerStore};
use fsim_core::types::DbId;
use fsim_core::worker::Worker;
use fsim_events::{ProgramEvent, WorkerEvent};
use fsim_protocol::Command;
use uuid::Uuid;

use crate::context::EngineContext;

/// Start the `online` handshake with a freshly connected worker.
///
/// The worker is marked online only once it answers the returned command.
pub async fn worker_connected(ctx: &EngineContext, worker: &Worker) -> Result<Uuid, CoreError> {
    let cmd = Command::online();
    ctx.store.set_worker_command(worker.id, cmd.id).await?;
    ctx.commands.send(worker.id, &cmd).await?;
    tracing::info!(worker_id = worker.id, uuid = %cmd.id, "Sent online handshake");
    Ok(cmd.id)
}

/// Tear down everything tied to a lost worker connection.
///
/// Returns the runs that were dropped.
pub async fn worker_disconnected(
    ctx: &EngineContext,
    worker_id: DbId,
) -> Result<Vec<ProgramRun>, CoreError> {
    let was_online = ctx.store.set_worker_offline(worker_id).await?;
    let runs = ctx.store.delete_runs_for_worker(worker_id).await?;

    for run in runs.iter().filter(|r| r.running) {
        ctx.bus.publish(ProgramEvent::Finished {
            pid: run.program_id,
            code: DISCONNECTED_CODE.to_string(),
        });
    }

    tracing::info!(
        worker_id,
        was_online,
        dropped_runs = runs.len(),
        "Worker disconnected",
    );
    ctx.bus.publish(WorkerEvent::Disconnected { sid: worker_id });
    ctx.wake.notify();
    Ok(runs)
}
