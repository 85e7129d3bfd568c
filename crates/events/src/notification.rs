//! Typed notification payloads.
//!
//! Each topic serializes to a flat object tagged by its status key, e.g.
//! `{"script_status": "next_step", "script_id": 1, "index": 0, ...}`.

use fsim_core::types::{DbId, StepIndex};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "script_status", rename_all = "snake_case")]
pub enum ScriptEvent {
    WaitingForSlaves {
        script_id: DbId,
    },
    NextStep {
        script_id: DbId,
        /// `-1` once every step ran.
        index: StepIndex,
        last_index: StepIndex,
        /// Longest positive program timeout of the step, in seconds.
        start_time: i32,
    },
    Success {
        script_id: DbId,
    },
    Error {
        script_id: DbId,
        error_code: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "program_status", rename_all = "snake_case")]
pub enum ProgramEvent {
    Started { pid: DbId },
    Finished { pid: DbId, code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "slave_status", rename_all = "snake_case")]
pub enum WorkerEvent {
    Connected { sid: DbId },
    Disconnected { sid: DbId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "filesystem_status", rename_all = "snake_case")]
pub enum FilesystemEvent {
    Moved { fid: DbId },
    Restored { fid: DbId },
    Error { fid: DbId, error_code: String },
}

/// Anything published on the notification topic with an `ok` outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Notification {
    Script(ScriptEvent),
    Program(ProgramEvent),
    Worker(WorkerEvent),
    Filesystem(FilesystemEvent),
    Message { message: String },
    Log { log: String, pid: DbId },
}

impl Notification {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl From<ScriptEvent> for Notification {
    fn from(e: ScriptEvent) -> Self {
        Self::Script(e)
    }
}

impl From<ProgramEvent> for Notification {
    fn from(e: ProgramEvent) -> Self {
        Self::Program(e)
    }
}

impl From<WorkerEvent> for Notification {
    fn from(e: WorkerEvent) -> Self {
        Self::Worker(e)
    }
}

impl From<FilesystemEvent> for Notification {
    fn from(e: FilesystemEvent) -> Self {
        Self::Filesystem(e)
    }
}
