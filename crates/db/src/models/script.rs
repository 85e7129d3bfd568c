use fsim_core::script::{EntryTarget, Script, ScriptEntry};
use fsim_core::types::{DbId, StepIndex, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `scripts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScriptRow {
    pub id: DbId,
    pub name: String,
    pub last_ran: Option<Timestamp>,
    pub is_initialized: bool,
    pub is_running: bool,
    pub error_code: Option<String>,
    pub current_index: StepIndex,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ScriptRow> for Script {
    fn from(row: ScriptRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            last_ran: row.last_ran,
            is_initialized: row.is_initialized,
            is_running: row.is_running,
            error_code: row.error_code,
            current_index: row.current_index,
        }
    }
}

/// A row of the union over `script_programs` and `script_filesystems`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScriptEntryRow {
    pub id: DbId,
    pub script_id: DbId,
    pub step_index: StepIndex,
    pub target_id: DbId,
    /// `"program"` or `"filesystem"`.
    pub kind: String,
}

impl From<ScriptEntryRow> for ScriptEntry {
    fn from(row: ScriptEntryRow) -> Self {
        let target = if row.kind == "program" {
            EntryTarget::Program(row.target_id)
        } else {
            EntryTarget::Filesystem(row.target_id)
        };
        Self {
            script_id: row.script_id,
            index: row.step_index,
            target,
        }
    }
}
