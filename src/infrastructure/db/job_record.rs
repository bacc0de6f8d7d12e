use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::pool::DbPool;
use crate::modules::transcode::model::JobStatus;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("no record updated for key {0}")]
    NotUpdated(String),
}

/// Persistent job record, keyed by the input object's key.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    async fn set_status(&self, key: &str, status: JobStatus) -> Result<(), RecordError>;
}

pub struct PgJobRecordStore {
    pool: DbPool,
    upsert_sql: String,
}

impl PgJobRecordStore {
    /// `table` must already be validated as a plain SQL identifier.
    pub fn new(pool: DbPool, table: &str) -> Self {
        let upsert_sql = format!(
            r#"
            INSERT INTO {table} (key, status, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET status = EXCLUDED.status, updated_at = NOW()
            "#
        );

        Self { pool, upsert_sql }
    }
}

#[async_trait]
impl JobRecordStore for PgJobRecordStore {
    async fn set_status(&self, key: &str, status: JobStatus) -> Result<(), RecordError> {
        let result = sqlx::query(&self.upsert_sql)
            .bind(key)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RecordError::NotUpdated(key.to_string()));
        }

        debug!(key, status = %status, "Job record updated");
        Ok(())
    }
}
