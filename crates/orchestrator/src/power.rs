//! Manual worker power control.

use fsim_core::error::CoreError;
use fsim_core::worker::Worker;
use fsim_events::Notification;
use fsim_protocol::Command;

use crate::context::EngineContext;

/// Send a wake-on-LAN packet to `worker`, online or not.
pub async fn wake_worker(ctx: &EngineContext, worker: &Worker) -> Result<(), CoreError> {
    ctx.waker.wake(worker).await?;
    ctx.bus.publish(Notification::message(format!(
        "Send wake-on-LAN packet to client `{}`",
        worker.name
    )));
    Ok(())
}

/// Ask an online `worker` to power off. The worker does not answer; its
/// socket closing marks it offline.
pub async fn shutdown_worker(ctx: &EngineContext, worker: &Worker) -> Result<Command, CoreError> {
    if !worker.online {
        return Err(CoreError::WorkerOffline {
            action: "shut down",
            kind: "client",
            name: worker.name.clone(),
            worker: worker.name.clone(),
        });
    }

    let cmd = Command::shutdown();
    ctx.commands.send(worker.id, &cmd).await?;
    tracing::info!(worker_id = worker.id, "Sent shutdown command");
    ctx.bus.publish(Notification::message(format!(
        "Send shutdown command to client `{}`",
        worker.name
    )));
    Ok(cmd)
}
