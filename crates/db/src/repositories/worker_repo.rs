//! Repository for the `workers` table.

use fsim_core::types::DbId;
use fsim_core::worker::CreateWorker;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::worker::WorkerRow;

/// Column list for `workers` queries.
const COLUMNS: &str = "\
    id, name, ip_address, mac_address, online, command_id, created_at, updated_at";

/// Provides query operations for workers.
pub struct WorkerRepo;

impl WorkerRepo {
    // ── Queries ──────────────────────────────────────────────────────

    pub async fn create(pool: &PgPool, input: &CreateWorker) -> Result<WorkerRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO workers (name, ip_address, mac_address) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkerRow>(&query)
            .bind(&input.name)
            .bind(&input.ip_address)
            .bind(&input.mac_address)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<WorkerRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers WHERE id = $1");
        sqlx::query_as::<_, WorkerRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<WorkerRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers ORDER BY id ASC");
        sqlx::query_as::<_, WorkerRow>(&query).fetch_all(pool).await
    }

    pub async fn find_by_ip(
        pool: &PgPool,
        ip_address: &str,
    ) -> Result<Option<WorkerRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers WHERE ip_address = $1");
        sqlx::query_as::<_, WorkerRow>(&query)
            .bind(ip_address)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_command(
        pool: &PgPool,
        command_id: Uuid,
    ) -> Result<Option<WorkerRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers WHERE command_id = $1");
        sqlx::query_as::<_, WorkerRow>(&query)
            .bind(command_id)
            .fetch_optional(pool)
            .await
    }

    // ── Liveness ─────────────────────────────────────────────────────

    pub async fn set_command(pool: &PgPool, id: DbId, command_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE workers SET command_id = $2 WHERE id = $1")
            .bind(id)
            .bind(command_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Mark the worker awaiting `command_id` online.
    pub async fn set_online(
        pool: &PgPool,
        command_id: Uuid,
    ) -> Result<Option<WorkerRow>, sqlx::Error> {
        let query = format!(
            "UPDATE workers SET online = true WHERE command_id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkerRow>(&query)
            .bind(command_id)
            .fetch_optional(pool)
            .await
    }

    /// Mark offline and drop the pending command. Returns the previous `online` flag.
    pub async fn set_offline(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let prev: Option<(bool,)> = sqlx::query_as(
            "WITH prev AS (SELECT id, online FROM workers WHERE id = $1 FOR UPDATE) \
             UPDATE workers w SET online = false, command_id = NULL \
             FROM prev WHERE w.id = prev.id \
             RETURNING prev.online",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(prev.is_some_and(|(online,)| online))
    }
}
