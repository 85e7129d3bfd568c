//! Repository for the `scripts`, `script_programs` and `script_filesystems` tables.

use fsim_core::types::{DbId, StepIndex};
use sqlx::PgPool;

use crate::models::script::{ScriptEntryRow, ScriptRow};

/// Column list for `scripts` queries.
const COLUMNS: &str = "\
    id, name, last_ran, is_initialized, is_running, error_code, current_index, \
    created_at, updated_at";

/// Provides query operations for scripts and their entries.
pub struct ScriptRepo;

impl ScriptRepo {
    // ── Scripts ──────────────────────────────────────────────────────

    pub async fn create(pool: &PgPool, name: &str) -> Result<ScriptRow, sqlx::Error> {
        let query = format!("INSERT INTO scripts (name) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, ScriptRow>(&query)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ScriptRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scripts WHERE id = $1");
        sqlx::query_as::<_, ScriptRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    // ── Entries ──────────────────────────────────────────────────────

    pub async fn add_program(
        pool: &PgPool,
        script_id: DbId,
        index: StepIndex,
        program_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO script_programs (script_id, step_index, program_id) VALUES ($1, $2, $3)",
        )
        .bind(script_id)
        .bind(index)
        .bind(program_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn add_filesystem(
        pool: &PgPool,
        script_id: DbId,
        index: StepIndex,
        relocation_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO script_filesystems (script_id, step_index, relocation_id) \
             VALUES ($1, $2, $3)",
        )
        .bind(script_id)
        .bind(index)
        .bind(relocation_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Entries ordered by step, programs before filesystems, then insertion.
    pub async fn list_entries(
        pool: &PgPool,
        script_id: DbId,
    ) -> Result<Vec<ScriptEntryRow>, sqlx::Error> {
        sqlx::query_as::<_, ScriptEntryRow>(
            "SELECT id, script_id, step_index, program_id AS target_id, 'program' AS kind \
             FROM script_programs WHERE script_id = $1 \
             UNION ALL \
             SELECT id, script_id, step_index, relocation_id AS target_id, 'filesystem' AS kind \
             FROM script_filesystems WHERE script_id = $1 \
             ORDER BY step_index ASC, kind DESC, id ASC",
        )
        .bind(script_id)
        .fetch_all(pool)
        .await
    }

    // ── Run bookkeeping ──────────────────────────────────────────────

    pub async fn mark_started(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE scripts \
             SET is_running = true, is_initialized = true, current_index = -1, error_code = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_current_index(
        pool: &PgPool,
        id: DbId,
        index: StepIndex,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE scripts SET current_index = $2 WHERE id = $1")
            .bind(id)
            .bind(index)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// End a run. `last_ran` moves only when there is no error.
    pub async fn finish(pool: &PgPool, id: DbId, error: Option<&str>) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE scripts \
             SET is_running = false, \
                 error_code = $2::TEXT, \
                 last_ran = CASE WHEN $2::TEXT IS NULL THEN NOW() ELSE last_ran END \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }
}
