//! Delivery queue producer.
//!
//! The poller only enqueues; claiming and completion live in the worker,
//! which owns the consuming side of the `notification_jobs` table.

use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

/// Repository for enqueueing notification jobs.
pub struct JobRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> JobRepository<'a> {
    /// Create a new job repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a job with a JSON payload. Returns the new job id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn enqueue(
        &self,
        job_type: &str,
        payload: &serde_json::Value,
    ) -> Result<Uuid, RepositoryError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r"
            INSERT INTO notification_jobs (id, job_type, payload)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(id)
        .bind(job_type)
        .bind(payload)
        .execute(self.pool)
        .await?;

        Ok(id)
    }
}
