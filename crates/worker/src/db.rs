//! Job queue persistence for the delivery worker.
//!
//! Jobs are claimed with `FOR UPDATE SKIP LOCKED`, so several worker
//! processes can drain the same queue without double delivery. A failed
//! delivery is terminal; `requeue_stale` only rescues jobs whose worker
//! died mid-run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

/// Claims per job before a stale sweep abandons it.
pub const MAX_JOB_ATTEMPTS: i32 = 3;

/// Age at which a `running` job is considered orphaned.
const STALE_AFTER_SECS: f64 = 300.0;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Lifecycle state of a notification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// One durable notification job.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Result of one stale-job sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleSweep {
    /// Orphaned jobs put back in the queue.
    pub requeued: u64,
    /// Orphaned jobs marked failed because they ran out of attempts.
    pub abandoned: u64,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Repository for the `notification_jobs` queue.
pub struct JobRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> JobRepository<'a> {
    /// Create a new repository backed by the given pool.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Claim the oldest queued job and mark it running.
    ///
    /// Returns `None` when the queue is empty. The claim increments the
    /// attempt counter so a crash before completion is visible to the
    /// stale sweep.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on query failure.
    pub async fn claim_next(&self) -> Result<Option<NotificationJob>, RepositoryError> {
        let job = sqlx::query_as::<_, NotificationJob>(
            r"
            UPDATE notification_jobs
            SET status = 'running', started_at = NOW(), attempts = attempts + 1
            WHERE id = (
                SELECT id
                FROM notification_jobs
                WHERE status = 'queued'
                ORDER BY created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, job_type, payload, status, attempts, last_error,
                      created_at, started_at, finished_at
            ",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(job)
    }

    /// Mark a job as delivered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on query failure.
    pub async fn mark_completed(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE notification_jobs SET status = 'completed', finished_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Record a delivery failure.
    ///
    /// Failures are terminal: the job stays `failed` with the error text
    /// for inspection and is never retried automatically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on query failure.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE notification_jobs
            SET status = 'failed', finished_at = NOW(), last_error = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Rescue jobs orphaned by a crashed worker.
    ///
    /// A `running` job older than the stale window is either put back in
    /// the queue or, once it has used up its attempts, abandoned as failed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on query failure.
    pub async fn requeue_stale(&self) -> Result<StaleSweep, RepositoryError> {
        let requeued = sqlx::query(
            r"
            UPDATE notification_jobs
            SET status = 'queued', started_at = NULL
            WHERE status = 'running'
              AND started_at < NOW() - make_interval(secs => $1)
              AND attempts < $2
            ",
        )
        .bind(STALE_AFTER_SECS)
        .bind(MAX_JOB_ATTEMPTS)
        .execute(self.pool)
        .await?
        .rows_affected();

        let abandoned = sqlx::query(
            r"
            UPDATE notification_jobs
            SET status = 'failed', finished_at = NOW(),
                last_error = 'abandoned after max attempts'
            WHERE status = 'running'
              AND started_at < NOW() - make_interval(secs => $1)
              AND attempts >= $2
            ",
        )
        .bind(STALE_AFTER_SECS)
        .bind(MAX_JOB_ATTEMPTS)
        .execute(self.pool)
        .await?
        .rows_affected();

        Ok(StaleSweep {
            requeued,
            abandoned,
        })
    }
}
