//! Persistence layer for tenant integration registrations.
//!
//! Models mirror database rows (`FromRow` + `Serialize`); repositories are
//! zero-sized structs providing async CRUD methods that accept `&PgPool` as
//! the first argument. Config blobs are stored as JSONB and converted into
//! the typed domain representation at the read boundary.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}
