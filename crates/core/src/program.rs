//! Programs and the execution tracker record for one invocation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{DbId, Timestamp};

/// Result code a worker reports for a successful execution.
pub const SUCCESS_CODE: &str = "0";

/// Result code recorded for runs dropped because their worker went away.
pub const DISCONNECTED_CODE: &str = "worker disconnected";

/// An executable located on a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: DbId,
    pub name: String,
    pub worker_id: DbId,
    pub path: String,
    pub arguments: Vec<String>,
    /// Seconds the program needs to come up. Negative disables the timer,
    /// zero makes the program fire-and-forget.
    pub timeout_secs: i32,
}

/// DTO for creating a program.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProgram {
    pub name: String,
    pub worker_id: DbId,
    pub path: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: i32,
}

fn default_timeout_secs() -> i32 {
    -1
}

/// How the tracker treats a program's configured timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramTimeout {
    /// Wait for the worker's reply.
    None,
    /// Counted as started the moment it is dispatched.
    Immediate,
    /// Counted as started once the duration elapses, even without a reply.
    After(Duration),
}

impl Program {
    pub fn timeout(&self) -> ProgramTimeout {
        match self.timeout_secs {
            t if t < 0 => ProgramTimeout::None,
            0 => ProgramTimeout::Immediate,
            t => ProgramTimeout::After(Duration::from_secs(t as u64)),
        }
    }
}

/// Tracking record for one dispatch of a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRun {
    pub program_id: DbId,
    /// Id of the `execute` command, echoed back by the worker.
    pub command_id: Uuid,
    pub started_at: Timestamp,
    pub running: bool,
    pub timed_out: bool,
    pub result_code: Option<String>,
}

/// Scheduling view of a [`ProgramRun`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Running and its timeout (if any) has not elapsed.
    InFlight,
    /// Still running but the timeout elapsed. Counts as complete.
    TimedOut,
    Succeeded,
    Failed(String),
}

impl ProgramRun {
    pub fn new(program_id: DbId, command_id: Uuid) -> Self {
        Self {
            program_id,
            command_id,
            started_at: chrono::Utc::now(),
            running: true,
            timed_out: false,
            result_code: None,
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.running {
            if self.timed_out {
                RunOutcome::TimedOut
            } else {
                RunOutcome::InFlight
            }
        } else {
            match self.result_code.as_deref() {
                None | Some(SUCCESS_CODE) => RunOutcome::Succeeded,
                Some(code) => RunOutcome::Failed(code.to_string()),
            }
        }
    }
}
