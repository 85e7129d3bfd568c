use fsim_core::error::CoreError;
use fsim_core::relocation::RelocationRecord;
use fsim_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `relocations` table. Kinds are stored as `'file'`/`'dir'`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RelocationRow {
    pub id: DbId,
    pub name: String,
    pub worker_id: DbId,
    pub source_path: String,
    pub source_kind: String,
    pub destination_path: String,
    pub destination_kind: String,
    pub command_id: Option<Uuid>,
    pub content_hash: Option<String>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<RelocationRow> for RelocationRecord {
    type Error = CoreError;

    fn try_from(row: RelocationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            worker_id: row.worker_id,
            source_path: row.source_path,
            source_kind: row.source_kind.parse()?,
            destination_path: row.destination_path,
            destination_kind: row.destination_kind.parse()?,
            command_id: row.command_id,
            content_hash: row.content_hash,
            last_error: row.last_error,
        })
    }
}
