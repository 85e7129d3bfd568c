//! Repository for the `programs` and `program_runs` tables.

use fsim_core::program::{CreateProgram, ProgramRun};
use fsim_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::program::{ProgramRow, ProgramRunRow};

/// Column list for `programs` queries.
const COLUMNS: &str = "\
    id, name, worker_id, path, arguments, timeout_secs, created_at, updated_at";

/// Column list for `program_runs` queries.
const RUN_COLUMNS: &str = "\
    id, program_id, command_id, started_at, running, timed_out, result_code";

/// Provides query operations for programs and their tracked runs.
pub struct ProgramRepo;

impl ProgramRepo {
    // ── Programs ─────────────────────────────────────────────────────

    pub async fn create(pool: &PgPool, input: &CreateProgram) -> Result<ProgramRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO programs (name, worker_id, path, arguments, timeout_secs) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProgramRow>(&query)
            .bind(&input.name)
            .bind(input.worker_id)
            .bind(&input.path)
            .bind(Json(&input.arguments))
            .bind(input.timeout_secs)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ProgramRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM programs WHERE id = $1");
        sqlx::query_as::<_, ProgramRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_worker(
        pool: &PgPool,
        worker_id: DbId,
    ) -> Result<Vec<ProgramRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM programs WHERE worker_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, ProgramRow>(&query)
            .bind(worker_id)
            .fetch_all(pool)
            .await
    }

    // ── Runs ─────────────────────────────────────────────────────────

    pub async fn find_run(
        pool: &PgPool,
        program_id: DbId,
    ) -> Result<Option<ProgramRunRow>, sqlx::Error> {
        let query = format!("SELECT {RUN_COLUMNS} FROM program_runs WHERE program_id = $1");
        sqlx::query_as::<_, ProgramRunRow>(&query)
            .bind(program_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_run_by_command(
        pool: &PgPool,
        command_id: Uuid,
    ) -> Result<Option<ProgramRunRow>, sqlx::Error> {
        let query = format!("SELECT {RUN_COLUMNS} FROM program_runs WHERE command_id = $1");
        sqlx::query_as::<_, ProgramRunRow>(&query)
            .bind(command_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a run, replacing the program's previous one.
    pub async fn upsert_run(pool: &PgPool, run: &ProgramRun) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO program_runs \
                 (program_id, command_id, started_at, running, timed_out, result_code) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (program_id) DO UPDATE SET \
                 command_id = EXCLUDED.command_id, \
                 started_at = EXCLUDED.started_at, \
                 running = EXCLUDED.running, \
                 timed_out = EXCLUDED.timed_out, \
                 result_code = EXCLUDED.result_code",
        )
        .bind(run.program_id)
        .bind(run.command_id)
        .bind(run.started_at)
        .bind(run.running)
        .bind(run.timed_out)
        .bind(&run.result_code)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete_run(
        pool: &PgPool,
        program_id: DbId,
        command_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM program_runs WHERE program_id = $1 AND command_id = $2")
                .bind(program_id)
                .bind(command_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the result of a still-running run.
    pub async fn finish_run(
        pool: &PgPool,
        command_id: Uuid,
        code: &str,
    ) -> Result<Option<ProgramRunRow>, sqlx::Error> {
        let query = format!(
            "UPDATE program_runs SET running = false, result_code = $2 \
             WHERE command_id = $1 AND running \
             RETURNING {RUN_COLUMNS}"
        );
        sqlx::query_as::<_, ProgramRunRow>(&query)
            .bind(command_id)
            .bind(code)
            .fetch_optional(pool)
            .await
    }

    pub async fn mark_timed_out(pool: &PgPool, command_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE program_runs SET timed_out = true \
             WHERE command_id = $1 AND running AND NOT timed_out",
        )
        .bind(command_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_runs_for_worker(
        pool: &PgPool,
        worker_id: DbId,
    ) -> Result<Vec<ProgramRunRow>, sqlx::Error> {
        let query = format!(
            "DELETE FROM program_runs \
             WHERE program_id IN (SELECT id FROM programs WHERE worker_id = $1) \
             RETURNING {RUN_COLUMNS}"
        );
        sqlx::query_as::<_, ProgramRunRow>(&query)
            .bind(worker_id)
            .fetch_all(pool)
            .await
    }
}
