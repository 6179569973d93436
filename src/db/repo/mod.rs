//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `positions.rs` - Version-gated position upserts and reads
//! - `checkpoint.rs` - Indexer resume cursor

mod checkpoint;
mod positions;

use sqlx::sqlite::SqlitePool;

pub use positions::UpsertOutcome;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Round-trip a trivial query to check the store is reachable.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Wrap a value conversion failure raised before binding.
///
/// sqlx 0.7 has no encode variant, so this surfaces as a protocol error.
fn encode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error,
{
    sqlx::Error::Protocol(format!("cannot encode value: {}", err))
}

/// Wrap a column conversion failure as a decode error.
fn decode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

/// Ledger versions are u64 on chain but stored as SQLite INTEGER.
fn version_to_i64(version: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(version).map_err(encode_error)
}

fn version_from_i64(version: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(version).map_err(decode_error)
}
