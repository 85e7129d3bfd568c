//! Program execution tracker: starting, stopping and log control.

use fsim_core::error::CoreError;
use fsim_core::program::{Program, ProgramRun, ProgramTimeout};
use fsim_core::store::{ProgramStore, WorkerStore};
use fsim_core::worker::Worker;
use fsim_events::ProgramEvent;
use fsim_protocol::command::LogTarget;
use fsim_protocol::{Command, CommandKind};
use uuid::Uuid;

use crate::context::EngineContext;

/// Log operations on a program's current execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRequest {
    Fetch,
    Enable,
    Disable,
}

impl LogRequest {
    fn action(self) -> &'static str {
        match self {
            Self::Fetch => "fetch the log of",
            Self::Enable => "enable logging for",
            Self::Disable => "disable logging for",
        }
    }

    fn command(self, target_uuid: Uuid) -> Command {
        let target = LogTarget { target_uuid };
        Command::new(match self {
            Self::Fetch => CommandKind::GetLog(target),
            Self::Enable => CommandKind::EnableLogging(target),
            Self::Disable => CommandKind::DisableLogging(target),
        })
    }
}

/// Load the worker `program` lives on and require it to be online.
async fn online_worker(
    ctx: &EngineContext,
    program: &Program,
    action: &'static str,
) -> Result<Worker, CoreError> {
    let worker = ctx
        .store
        .get_worker(program.worker_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "worker",
            id: program.worker_id,
        })?;
    if !worker.online {
        return Err(CoreError::WorkerOffline {
            action,
            kind: "program",
            name: program.name.clone(),
            worker: worker.name,
        });
    }
    Ok(worker)
}

/// Dispatch `program` to its worker and start tracking the execution.
///
/// Returns the command id, which is also the run's correlation id.
pub async fn start_program(ctx: &EngineContext, program: &Program) -> Result<Uuid, CoreError> {
    let worker = online_worker(ctx, program, "start").await?;

    if let Some(run) = ctx.store.get_run(program.id).await? {
        if run.running {
            return Err(CoreError::program_already_running(&program.name, &worker.name));
        }
    }

    let cmd = Command::execute(program);
    let run = ProgramRun::new(program.id, cmd.id);
    ctx.store.replace_run(&run).await?;

    if let Err(e) = ctx.commands.send(worker.id, &cmd).await {
        tracing::error!(program_id = program.id, error = %e, "Failed to send execute command");
        ctx.store.delete_run(program.id, cmd.id).await?;
        return Err(e);
    }

    tracing::info!(
        program_id = program.id,
        worker_id = worker.id,
        uuid = %cmd.id,
        "Program started",
    );
    ctx.bus.publish(ProgramEvent::Started { pid: program.id });

    match program.timeout() {
        ProgramTimeout::None => {}
        ProgramTimeout::Immediate => {
            ctx.store.mark_run_timed_out(cmd.id).await?;
            ctx.wake.notify();
        }
        ProgramTimeout::After(duration) => {
            let ctx = ctx.clone();
            let command_id = cmd.id;
            let program_id = program.id;
            tokio::spawn(async move {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => {}
                    _ = tokio::time::sleep(duration) => {
                        match ctx.store.mark_run_timed_out(command_id).await {
                            Ok(true) => {
                                tracing::debug!(program_id, "Program start time elapsed");
                                ctx.wake.notify();
                            }
                            Ok(false) => {}
                            Err(e) => {
                                tracing::error!(program_id, error = %e, "Failed to mark program timed out");
                            }
                        }
                    }
                }
            });
        }
    }

    Ok(cmd.id)
}

/// Ask the worker to stop the running execution of `program`.
pub async fn stop_program(ctx: &EngineContext, program: &Program) -> Result<(), CoreError> {
    let worker = online_worker(ctx, program, "stop").await?;

    let run = ctx
        .store
        .get_run(program.id)
        .await?
        .filter(|r| r.running)
        .ok_or_else(|| CoreError::program_not_running("stop", &program.name, &worker.name))?;

    ctx.commands.send(worker.id, &Command::stop(run.command_id)).await?;
    tracing::info!(program_id = program.id, uuid = %run.command_id, "Stop requested");
    Ok(())
}

/// Fetch, enable or disable the log of `program`'s current execution.
pub async fn request_log(
    ctx: &EngineContext,
    program: &Program,
    request: LogRequest,
) -> Result<(), CoreError> {
    let worker = online_worker(ctx, program, request.action()).await?;

    let run = ctx.store.get_run(program.id).await?.ok_or_else(|| {
        CoreError::program_not_running(request.action(), &program.name, &worker.name)
    })?;

    ctx.commands
        .send(worker.id, &request.command(run.command_id))
        .await
}
