//! Scripts: ordered steps of program and filesystem entries.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, StepIndex, Timestamp};

/// A script and its persisted run bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub id: DbId,
    pub name: String,
    /// Set only when a run finishes successfully.
    pub last_ran: Option<Timestamp>,
    pub is_initialized: bool,
    pub is_running: bool,
    pub error_code: Option<String>,
    pub current_index: StepIndex,
}

/// What a script entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntryTarget {
    Program(DbId),
    Filesystem(DbId),
}

/// One `(index, target)` pair of a script. Several entries may share an
/// index; they form one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub script_id: DbId,
    pub index: StepIndex,
    pub target: EntryTarget,
}

/// Smallest index in `indexes` strictly greater than `current`.
pub fn next_index(indexes: &[StepIndex], current: StepIndex) -> Option<StepIndex> {
    indexes.iter().copied().filter(|i| *i > current).min()
}

/// Program ids and filesystem ids of a step, in that order.
pub fn split_entries(entries: &[ScriptEntry]) -> (Vec<DbId>, Vec<DbId>) {
    let mut programs = Vec::new();
    let mut filesystems = Vec::new();
    for entry in entries {
        match entry.target {
            EntryTarget::Program(id) => programs.push(id),
            EntryTarget::Filesystem(id) => filesystems.push(id),
        }
    }
    (programs, filesystems)
}
