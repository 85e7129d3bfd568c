//! Persistence for the orchestration engine.
//!
//! - [`PgStore`] implements the store traits on PostgreSQL through the
//!   zero-sized repositories in [`repositories`].
//! - [`MemoryStore`] keeps everything in process.

pub mod memory;
pub mod models;
pub mod pg_store;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;

pub use memory::MemoryStore;
pub use pg_store::PgStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the connection.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
