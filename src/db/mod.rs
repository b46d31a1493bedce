//! Database module for SQLite persistence
//!
//! Holds the single `vins` table and its repository.

mod schema;
mod vins;

pub use schema::*;
pub use vins::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::Result;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Create an in-memory pool with the schema applied.
///
/// Limited to one connection that is never recycled, since every SQLite
/// memory connection is its own database.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_pool_persists_between_pools() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("vins.db").display());

        let pool = create_pool(&url).await.unwrap();
        VinRepository::new(&pool)
            .create(&NewVin::new("1HGCM82633A123456"))
            .await
            .unwrap();
        pool.close().await;

        let reopened = create_pool(&url).await.unwrap();
        let records = VinRepository::new(&reopened).list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "1HGCM82633A123456");
    }
}
