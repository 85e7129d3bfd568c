//! Repository for the `relocations` table.

use fsim_core::relocation::CreateRelocation;
use fsim_core::types::DbId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::relocation::RelocationRow;

/// Column list for `relocations` queries.
const COLUMNS: &str = "\
    id, name, worker_id, source_path, source_kind, destination_path, destination_kind, \
    command_id, content_hash, last_error, created_at, updated_at";

/// Provides query operations for filesystem relocations.
pub struct RelocationRepo;

impl RelocationRepo {
    // ── Queries ──────────────────────────────────────────────────────

    pub async fn create(
        pool: &PgPool,
        input: &CreateRelocation,
    ) -> Result<RelocationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO relocations \
                 (name, worker_id, source_path, source_kind, destination_path, destination_kind) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RelocationRow>(&query)
            .bind(&input.name)
            .bind(input.worker_id)
            .bind(&input.source_path)
            .bind(input.source_kind.as_str())
            .bind(&input.destination_path)
            .bind(input.destination_kind.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<RelocationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM relocations WHERE id = $1");
        sqlx::query_as::<_, RelocationRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_command(
        pool: &PgPool,
        command_id: Uuid,
    ) -> Result<Option<RelocationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM relocations WHERE command_id = $1");
        sqlx::query_as::<_, RelocationRow>(&query)
            .bind(command_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_moved_for_worker(
        pool: &PgPool,
        worker_id: DbId,
    ) -> Result<Vec<RelocationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM relocations \
             WHERE worker_id = $1 AND content_hash IS NOT NULL AND content_hash <> '' \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, RelocationRow>(&query)
            .bind(worker_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list_for_worker(
        pool: &PgPool,
        worker_id: DbId,
    ) -> Result<Vec<RelocationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM relocations WHERE worker_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, RelocationRow>(&query)
            .bind(worker_id)
            .fetch_all(pool)
            .await
    }

    /// Delete a relocation that is not moved.
    pub async fn delete_unmoved(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM relocations \
             WHERE id = $1 AND (content_hash IS NULL OR content_hash = '')",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Command bookkeeping ──────────────────────────────────────────

    pub async fn set_command(pool: &PgPool, id: DbId, command_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE relocations SET command_id = $2, last_error = NULL WHERE id = $1")
            .bind(id)
            .bind(command_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_moved(
        pool: &PgPool,
        command_id: Uuid,
        content_hash: &str,
    ) -> Result<Option<RelocationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE relocations SET content_hash = $2, last_error = NULL \
             WHERE command_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RelocationRow>(&query)
            .bind(command_id)
            .bind(content_hash)
            .fetch_optional(pool)
            .await
    }

    pub async fn mark_restored(
        pool: &PgPool,
        command_id: Uuid,
    ) -> Result<Option<RelocationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE relocations SET content_hash = NULL, last_error = NULL \
             WHERE command_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RelocationRow>(&query)
            .bind(command_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn mark_error(
        pool: &PgPool,
        command_id: Uuid,
        error: &str,
    ) -> Result<Option<RelocationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE relocations SET last_error = $2 \
             WHERE command_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RelocationRow>(&query)
            .bind(command_id)
            .bind(error)
            .fetch_optional(pool)
            .await
    }
}
