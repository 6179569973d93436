//! Indexer resume cursor, one row per processor name.

use super::{decode_error, encode_error, version_from_i64, version_to_i64, Repository};
use crate::domain::{IndexerCheckpoint, TimestampUs};
use sqlx::Row;

impl Repository {
    /// Load the checkpoint for `processor_name`, if one was ever written.
    pub async fn get_checkpoint(
        &self,
        processor_name: &str,
    ) -> Result<Option<IndexerCheckpoint>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT processor_name, last_processed_version, last_processed_timestamp_us
            FROM indexer_state
            WHERE processor_name = ?
            "#,
        )
        .bind(processor_name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(IndexerCheckpoint {
                processor_name: row.try_get("processor_name")?,
                last_processed_version: version_from_i64(row.try_get("last_processed_version")?)?,
                last_processed_timestamp: TimestampUs::try_from_i64(
                    row.try_get("last_processed_timestamp_us")?,
                )
                .map_err(decode_error)?,
            })),
            None => Ok(None),
        }
    }

    /// Record that every version up to and including `version` has been processed.
    ///
    /// The stored version never regresses: a lower value leaves the row untouched
    /// and returns `false`. Re-submitting the current version refreshes the row.
    pub async fn advance_checkpoint(
        &self,
        processor_name: &str,
        version: u64,
        timestamp: TimestampUs,
    ) -> Result<bool, sqlx::Error> {
        let now = chrono::Utc::now().timestamp_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO indexer_state (
                processor_name, last_processed_version, last_processed_timestamp_us,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(processor_name) DO UPDATE SET
                last_processed_version = excluded.last_processed_version,
                last_processed_timestamp_us = excluded.last_processed_timestamp_us,
                updated_at = excluded.updated_at
            WHERE excluded.last_processed_version >= indexer_state.last_processed_version
            "#,
        )
        .bind(processor_name)
        .bind(version_to_i64(version)?)
        .bind(timestamp.to_i64().map_err(encode_error)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
