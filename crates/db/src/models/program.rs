use fsim_core::program::{Program, ProgramRun};
use fsim_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `programs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProgramRow {
    pub id: DbId,
    pub name: String,
    pub worker_id: DbId,
    pub path: String,
    pub arguments: Json<Vec<String>>,
    pub timeout_secs: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ProgramRow> for Program {
    fn from(row: ProgramRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            worker_id: row.worker_id,
            path: row.path,
            arguments: row.arguments.0,
            timeout_secs: row.timeout_secs,
        }
    }
}

/// A row from the `program_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProgramRunRow {
    pub id: DbId,
    pub program_id: DbId,
    pub command_id: Uuid,
    pub started_at: Timestamp,
    pub running: bool,
    pub timed_out: bool,
    pub result_code: Option<String>,
}

impl From<ProgramRunRow> for ProgramRun {
    fn from(row: ProgramRunRow) -> Self {
        Self {
            program_id: row.program_id,
            command_id: row.command_id,
            started_at: row.started_at,
            running: row.running,
            timed_out: row.timed_out,
            result_code: row.result_code,
        }
    }
}
