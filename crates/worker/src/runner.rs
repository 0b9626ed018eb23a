//! Queue consumption loop.
//!
//! Claims jobs on an interval and processes up to `concurrency` of them at
//! a time. Each job settles as completed or failed; one job failing never
//! touches the others in flight.

use std::future::Future;
use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use shelfwatch_core::{JOB_PRODUCT_BACK_IN_STOCK, NotificationBatch};

use crate::config::WorkerConfig;
use crate::db::{JobRepository, NotificationJob};
use crate::email::{EmailError, Mailer, deliver_batch};

/// Errors that can occur while processing a claimed job.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Job payload did not decode to the shape its type requires.
    #[error("invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Email rendering or delivery failed.
    #[error("delivery failed: {0}")]
    Email(#[from] EmailError),
}

/// Process one claimed job.
///
/// Unknown job types are logged and treated as done so they cannot wedge
/// the queue.
///
/// # Errors
///
/// Returns `ProcessError` if the payload is malformed or delivery fails.
pub async fn process_job<M: Mailer>(
    mailer: &M,
    storefront_base: &str,
    job: &NotificationJob,
) -> Result<(), ProcessError> {
    match job.job_type.as_str() {
        JOB_PRODUCT_BACK_IN_STOCK => {
            let batch: NotificationBatch = serde_json::from_value(job.payload.clone())?;
            tracing::info!(
                job_id = %job.id,
                user = %batch.user.email,
                products = batch.products.len(),
                "Delivering restock notification"
            );
            deliver_batch(mailer, storefront_base, &batch).await?;
            Ok(())
        }
        other => {
            tracing::warn!(job_id = %job.id, job_type = %other, "Skipping job with unknown type");
            Ok(())
        }
    }
}

/// The delivery worker.
///
/// Generic over [`Mailer`] so the loop can be exercised without SMTP.
pub struct Worker<M> {
    pool: PgPool,
    mailer: M,
    concurrency: usize,
    claim_interval: std::time::Duration,
    storefront_base: String,
}

impl<M> Worker<M>
where
    M: Mailer + Clone + 'static,
{
    /// Build a worker from configuration.
    #[must_use]
    pub fn new(pool: PgPool, mailer: M, config: &WorkerConfig) -> Self {
        Self {
            pool,
            mailer,
            concurrency: config.concurrency,
            claim_interval: config.claim_interval,
            storefront_base: config
                .storefront_base_url
                .as_str()
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Run until the shutdown future resolves, then drain in-flight jobs.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        match JobRepository::new(&self.pool).requeue_stale().await {
            Ok(sweep) if sweep.requeued > 0 || sweep.abandoned > 0 => {
                tracing::info!(
                    requeued = sweep.requeued,
                    abandoned = sweep.abandoned,
                    "Rescued stale jobs"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Stale job sweep failed"),
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut tick = tokio::time::interval(self.claim_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.drain_available(&semaphore, &mut tasks).await;
                }
                () = &mut shutdown => {
                    tracing::info!("Shutdown signal received, draining in-flight jobs");
                    break;
                }
            }
        }

        tracing::info!(in_flight = tasks.len(), "Waiting for in-flight jobs");
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Job task panicked");
            }
        }
    }

    /// Claim and spawn jobs until the queue is empty or all permits are taken.
    async fn drain_available(&self, semaphore: &Arc<Semaphore>, tasks: &mut JoinSet<()>) {
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                tracing::error!(error = %e, "Job task panicked");
            }
        }

        loop {
            let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else {
                break;
            };

            let job = match JobRepository::new(&self.pool).claim_next().await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim job");
                    break;
                }
            };

            let pool = self.pool.clone();
            let mailer = self.mailer.clone();
            let storefront_base = self.storefront_base.clone();
            tasks.spawn(async move {
                let _permit = permit;
                handle_job(&pool, &mailer, &storefront_base, job).await;
            });
        }
    }
}

/// Process a job and settle its queue row.
async fn handle_job<M: Mailer>(
    pool: &PgPool,
    mailer: &M,
    storefront_base: &str,
    job: NotificationJob,
) {
    let repository = JobRepository::new(pool);
    let job_id = job.id;

    match process_job(mailer, storefront_base, &job).await {
        Ok(()) => {
            if let Err(e) = repository.mark_completed(job_id).await {
                tracing::error!(job_id = %job_id, error = %e, "Failed to mark job completed");
            }
        }
        Err(e) => {
            tracing::error!(
                job_id = %job_id,
                job_type = %job.job_type,
                error = %e,
                "Job processing failed"
            );
            if let Err(db_err) = repository.mark_failed(job_id, &e.to_string()).await {
                tracing::error!(job_id = %job_id, error = %db_err, "Failed to mark job failed");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use uuid::Uuid;

    use shelfwatch_core::{Email, Product, ProductId, TrackedUser, UserId};

    use crate::db::JobStatus;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingMailer {
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Mailer for RecordingMailer {
        async fn send(
            &self,
            to: &Email,
            subject: &str,
            _text_body: &str,
            _html_body: &str,
        ) -> Result<(), EmailError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.as_str().to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn job_with(job_type: &str, payload: serde_json::Value) -> NotificationJob {
        NotificationJob {
            id: Uuid::new_v4(),
            job_type: job_type.to_string(),
            payload,
            status: JobStatus::Running,
            attempts: 1,
            last_error: None,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            finished_at: None,
        }
    }

    fn batch() -> NotificationBatch {
        NotificationBatch {
            user: TrackedUser {
                id: UserId::new("usr_1"),
                name: "Asha".to_owned(),
                email: Email::parse("asha@example.com").unwrap(),
            },
            products: vec![Product {
                id: ProductId::new("p1"),
                alias: "milk".to_owned(),
                sku: "SKU-1".to_owned(),
                name: "High Protein Milk".to_owned(),
                description: None,
                image: None,
                usual_price: 325,
            }],
        }
    }

    #[tokio::test]
    async fn test_back_in_stock_job_sends_one_email() {
        let mailer = RecordingMailer::default();
        let payload = serde_json::to_value(batch()).unwrap();
        let job = job_with(JOB_PRODUCT_BACK_IN_STOCK, payload);

        process_job(&mailer, "https://shop.example.com", &job)
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "asha@example.com");
        assert_eq!(
            sent[0].1,
            "Product Back in Stock: High Protein Milk is now available"
        );
    }

    #[tokio::test]
    async fn test_unknown_job_type_is_skipped_without_error() {
        let mailer = RecordingMailer::default();
        let job = job_with("price_drop", serde_json::json!({}));

        process_job(&mailer, "https://shop.example.com", &job)
            .await
            .unwrap();

        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_a_payload_error() {
        let mailer = RecordingMailer::default();
        let job = job_with(
            JOB_PRODUCT_BACK_IN_STOCK,
            serde_json::json!({"user": "not-an-object"}),
        );

        let result = process_job(&mailer, "https://shop.example.com", &job).await;

        assert!(matches!(result, Err(ProcessError::Payload(_))));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }
}
