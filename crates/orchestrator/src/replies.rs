//! Worker reply processing.
//!
//! Parses inbound [`Status`] frames into [`Reply`]s, applies them to the
//! tracked records through the store, publishes the matching notifications
//! and wakes the orchestrator.

use fsim_core::error::CoreError;
use fsim_core::store::{ProgramStore, RelocationStore, WorkerStore};
use fsim_events::{FilesystemEvent, Notification, ProgramEvent, WorkerEvent};
use fsim_protocol::{Reply, Status};
use uuid::Uuid;

use crate::context::EngineContext;
use crate::wake::Wake;

/// Handle one raw text frame received from a worker.
pub async fn process_text(ctx: &EngineContext, text: &str) {
    match Status::from_json(text) {
        Ok(status) => process_status(ctx, status).await,
        Err(e) => {
            tracing::warn!(error = %e, raw_message = %text, "Failed to parse worker reply");
        }
    }
}

/// Handle one decoded reply envelope.
pub async fn process_status(ctx: &EngineContext, status: Status) {
    let reply = match Reply::from_status(&status) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed worker reply");
            return;
        }
    };

    if reply.method == "chain_execution" {
        handle_chain(ctx, &reply).await;
        return;
    }
    handle_reply(ctx, &reply).await;
}

/// Dispatch a single non-chain reply. Store failures are logged here so a
/// broken record never takes down the socket loop.
async fn handle_reply(ctx: &EngineContext, reply: &Reply) {
    let result = match reply.method.as_str() {
        "online" => handle_online(ctx, reply).await,
        "execute" => handle_execute(ctx, reply).await,
        "filesystem_move" => handle_move(ctx, reply).await,
        "filesystem_restore" => handle_restore(ctx, reply).await,
        "get_log" => handle_get_log(ctx, reply).await,
        "enable_logging" | "disable_logging" => {
            tracing::debug!(method = %reply.method, ok = reply.is_ok(), "Logging toggled");
            Ok(())
        }
        "chain_execution" => {
            tracing::warn!("Ignoring nested chain_execution reply");
            Ok(())
        }
        other => {
            tracing::warn!(method = other, "Unknown reply method");
            Ok(())
        }
    };

    if let Err(e) = result {
        match e {
            CoreError::ProtocolCorrelation(id) => {
                tracing::warn!(method = %reply.method, uuid = %id, "Reply matches no tracked record");
            }
            other => {
                tracing::error!(method = %reply.method, error = %other, "Failed to apply worker reply");
            }
        }
    }
}

fn correlation(reply: &Reply) -> Result<Uuid, CoreError> {
    reply
        .correlation_id
        .ok_or(CoreError::ProtocolCorrelation(Uuid::nil()))
}

// ---- individual reply handlers ----

async fn handle_online(ctx: &EngineContext, reply: &Reply) -> Result<(), CoreError> {
    let id = correlation(reply)?;
    let outcome = if reply.is_ok() {
        match ctx.store.set_worker_online(id).await? {
            Some(worker) => {
                tracing::info!(worker_id = worker.id, name = %worker.name, "Worker online");
                ctx.bus.publish(WorkerEvent::Connected { sid: worker.id });
                Ok(())
            }
            None => Err(CoreError::ProtocolCorrelation(id)),
        }
    } else {
        match ctx.store.find_worker_by_command(id).await? {
            Some(worker) => {
                tracing::warn!(worker_id = worker.id, result = %reply.result_text(), "Worker rejected online");
                ctx.bus.publish_error(format!(
                    "An error occurred while connecting to client {}!",
                    worker.name
                ));
                Ok(())
            }
            None => Err(CoreError::ProtocolCorrelation(id)),
        }
    };
    ctx.wake.post(Wake::WorkerOnline);
    outcome
}

async fn handle_execute(ctx: &EngineContext, reply: &Reply) -> Result<(), CoreError> {
    let id = correlation(reply)?;
    let code = reply.result_text();
    let outcome = match ctx.store.finish_run(id, &code).await? {
        Some(run) => {
            tracing::info!(program_id = run.program_id, code = %code, "Program finished");
            ctx.bus.publish(ProgramEvent::Finished {
                pid: run.program_id,
                code,
            });
            Ok(())
        }
        None => {
            // Either unknown or already terminal.
            match ctx.store.find_run_by_command(id).await? {
                Some(run) => {
                    tracing::debug!(program_id = run.program_id, "Ignoring reply for finished run");
                    Ok(())
                }
                None => Err(CoreError::ProtocolCorrelation(id)),
            }
        }
    };
    ctx.wake.post(Wake::CommandReply);
    outcome
}

async fn handle_move(ctx: &EngineContext, reply: &Reply) -> Result<(), CoreError> {
    let id = correlation(reply)?;
    let text = reply.result_text();
    let outcome = if reply.is_ok() {
        match ctx.store.mark_relocation_moved(id, &text).await? {
            Some(record) => {
                tracing::info!(relocation_id = record.id, "Filesystem moved");
                ctx.bus.publish(FilesystemEvent::Moved { fid: record.id });
                Ok(())
            }
            None => Err(CoreError::ProtocolCorrelation(id)),
        }
    } else {
        relocation_failed(ctx, id, &text).await
    };
    ctx.wake.post(Wake::CommandReply);
    outcome
}

async fn handle_restore(ctx: &EngineContext, reply: &Reply) -> Result<(), CoreError> {
    let id = correlation(reply)?;
    let outcome = if reply.is_ok() {
        match ctx.store.mark_relocation_restored(id).await? {
            Some(record) => {
                tracing::info!(relocation_id = record.id, "Filesystem restored");
                ctx.bus.publish(FilesystemEvent::Restored { fid: record.id });
                Ok(())
            }
            None => Err(CoreError::ProtocolCorrelation(id)),
        }
    } else {
        relocation_failed(ctx, id, &reply.result_text()).await
    };
    ctx.wake.post(Wake::CommandReply);
    outcome
}

async fn relocation_failed(ctx: &EngineContext, id: Uuid, error: &str) -> Result<(), CoreError> {
    match ctx.store.mark_relocation_error(id, error).await? {
        Some(record) => {
            tracing::warn!(relocation_id = record.id, error, "Filesystem operation failed");
            ctx.bus.publish(FilesystemEvent::Error {
                fid: record.id,
                error_code: error.to_string(),
            });
            Ok(())
        }
        None => Err(CoreError::ProtocolCorrelation(id)),
    }
}

async fn handle_get_log(ctx: &EngineContext, reply: &Reply) -> Result<(), CoreError> {
    if !reply.is_ok() {
        tracing::warn!(result = %reply.result_text(), "Worker failed to read log");
        ctx.bus
            .publish_error("An error occurred while reading a log file!");
        return Ok(());
    }

    let run = match reply.result_uuid().or(reply.correlation_id) {
        Some(id) => ctx.store.find_run_by_command(id).await?,
        None => None,
    };
    match run {
        Some(run) => {
            let log = reply
                .result_field("log")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            ctx.bus.publish(Notification::Log {
                log,
                pid: run.program_id,
            });
        }
        None => ctx.bus.publish_error("Received log from unknown program!"),
    }
    Ok(())
}

/// Apply each sub-reply of a chain in execution order.
///
/// A failed chain applies none of its parts. The failure lands on the
/// record awaiting the final command, whose id the chain shares.
async fn handle_chain(ctx: &EngineContext, reply: &Reply) {
    if !reply.is_ok() {
        let text = reply.result_text();
        tracing::warn!(result = %text, "Chain execution failed");
        let outcome = match correlation(reply) {
            Ok(id) => relocation_failed(ctx, id, &text).await,
            Err(e) => Err(e),
        };
        ctx.wake.post(Wake::CommandReply);
        match outcome {
            Ok(()) => {}
            Err(CoreError::ProtocolCorrelation(id)) => {
                tracing::warn!(uuid = %id, "Failed chain matches no tracked record");
                ctx.bus
                    .publish_error(format!("Chain execution failed: {text}"));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to record chain failure");
            }
        }
        return;
    }
    let statuses = match reply.chain_statuses() {
        Ok(statuses) => statuses,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed chain_execution result");
            return;
        }
    };
    for status in statuses {
        match Reply::from_status(&status) {
            Ok(sub) => handle_reply(ctx, &sub).await,
            Err(e) => tracing::warn!(error = %e, "Dropping malformed chain sub-reply"),
        }
    }
}
