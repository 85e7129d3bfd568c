use uuid::Uuid;

use crate::types::DbId;

/// Error taxonomy shared by every layer of the engine.
///
/// Caller-facing operations (start/stop program, move/restore relocation,
/// start run) return these instead of panicking across the orchestration
/// boundary. The `Display` text is what ends up in notifications and in the
/// persisted `error_code` of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// An action was attempted on a worker that is not connected.
    #[error("Could not {action} {kind} `{name}` because the client `{worker}` is offline.")]
    WorkerOffline {
        action: &'static str,
        kind: &'static str,
        name: String,
        worker: String,
    },

    /// Relocation already moved, program already running.
    #[error("{0}")]
    AlreadyInProgress(String),

    /// Restore/stop on an entity that is not in the matching state.
    #[error("{0}")]
    NotInProgress(String),

    /// Unexpected shape found while looking for destination conflicts.
    #[error("Conflict resolution failed: {0}")]
    ConflictResolution(String),

    /// A reply carried an id no tracked record knows about. Logged only.
    #[error("No tracked record for command {0}")]
    ProtocolCorrelation(Uuid),

    /// Worker-connect or program timeout.
    #[error("{0}")]
    RunTimeout(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The command could not be handed to the worker's channel.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The persisted entity store failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl CoreError {
    pub fn relocation_already_moved(name: &str, worker: &str) -> Self {
        Self::AlreadyInProgress(format!(
            "Could not move filesystem `{name}` on client `{worker}` because it is already moved."
        ))
    }

    pub fn relocation_not_moved(name: &str, worker: &str) -> Self {
        Self::NotInProgress(format!(
            "Could not restore filesystem `{name}` on client `{worker}` because it is not moved."
        ))
    }

    pub fn relocation_still_moved(name: &str, worker: &str) -> Self {
        Self::AlreadyInProgress(format!(
            "Can not delete filesystem `{name}` on client `{worker}` because it is still moved. \
             Restore the filesystem and try again."
        ))
    }

    pub fn program_already_running(name: &str, worker: &str) -> Self {
        Self::AlreadyInProgress(format!(
            "Could not start program `{name}` on client `{worker}` because it is already running."
        ))
    }

    /// `action` is the verb of the rejected request, e.g. `"stop"`.
    pub fn program_not_running(action: &str, name: &str, worker: &str) -> Self {
        Self::NotInProgress(format!(
            "Could not {action} program `{name}` on client `{worker}` because it is not running."
        ))
    }
}
