use fsim_core::types::{DbId, Timestamp};
use fsim_core::worker::Worker;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `workers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkerRow {
    pub id: DbId,
    pub name: String,
    pub ip_address: String,
    pub mac_address: String,
    pub online: bool,
    pub command_id: Option<Uuid>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<WorkerRow> for Worker {
    fn from(row: WorkerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            ip_address: row.ip_address,
            mac_address: row.mac_address,
            online: row.online,
            command_id: row.command_id,
        }
    }
}
