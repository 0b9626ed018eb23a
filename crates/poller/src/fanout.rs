//! Notification fan-out.
//!
//! Turns the diff output into delivery queue jobs. All of a user's newly
//! available products across every substore they track land in a single
//! job, so one poll cycle produces at most one email per user.

use std::collections::BTreeMap;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use shelfwatch_core::{
    InventorySnapshot, JOB_PRODUCT_BACK_IN_STOCK, NotificationBatch, ProductId, SubstoreId,
    TrackId, TrackingMatch, UserId,
};

use crate::db::{JobRepository, RepositoryError, TrackingRepository};
use crate::kv::{KeyValueStore, StoreError};
use crate::snapshot::SnapshotStore;

/// Errors that can fail a fan-out pass as a whole.
///
/// A single user's enqueue failure is logged and skipped instead.
#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("payload encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Group tracking matches into one batch per user.
///
/// Batches come out ordered by user id; products keep their match order
/// within a batch.
#[must_use]
pub fn group_by_user(matches: Vec<TrackingMatch>) -> Vec<NotificationBatch> {
    let mut batches: BTreeMap<UserId, NotificationBatch> = BTreeMap::new();
    for TrackingMatch { user, product, .. } in matches {
        batches
            .entry(user.id.clone())
            .or_insert_with(|| NotificationBatch {
                user,
                products: Vec::new(),
            })
            .products
            .push(product);
    }
    batches.into_values().collect()
}

/// Look up trackers for every newly available (substore, product) pair and
/// enqueue one notification job per affected user.
///
/// Returns the number of jobs enqueued.
///
/// # Errors
///
/// Returns error when the tracking lookup fails; enqueue failures only skip
/// the affected user.
#[instrument(skip_all, fields(substores = newly_available.len()))]
pub async fn dispatch_notifications(
    pool: &PgPool,
    newly_available: &BTreeMap<SubstoreId, Vec<ProductId>>,
) -> Result<usize, FanoutError> {
    let tracking = TrackingRepository::new(pool);

    let mut matches = Vec::new();
    for (substore_id, product_ids) in newly_available {
        for product_id in product_ids {
            matches.extend(
                tracking
                    .list_tracking_requests(substore_id, product_id)
                    .await?,
            );
        }
    }

    if matches.is_empty() {
        info!("no tracking requests match this cycle's restocks");
        return Ok(0);
    }

    let jobs = JobRepository::new(pool);
    let batches = group_by_user(matches);
    let mut enqueued = 0usize;
    for batch in &batches {
        let payload = serde_json::to_value(batch)?;
        match jobs.enqueue(JOB_PRODUCT_BACK_IN_STOCK, &payload).await {
            Ok(_) => enqueued += 1,
            Err(e) => {
                error!(user = %batch.user.email, error = %e, "failed to enqueue notification job");
            }
        }
    }

    info!(jobs = enqueued, users = batches.len(), "notification fan-out complete");
    Ok(enqueued)
}

/// Enqueue a notification for one tracking request if its product is already
/// available in the tracked substore.
///
/// The recurring diff only reports transitions, so a user who starts
/// tracking something that is in stock right now would otherwise hear
/// nothing until it sold out and came back. Returns whether a job was
/// enqueued.
///
/// # Errors
///
/// Returns error when the lookup, the snapshot load, or the enqueue fails.
#[instrument(skip(pool, snapshots), fields(track = %track_id))]
pub async fn notify_single_track<S: KeyValueStore>(
    pool: &PgPool,
    snapshots: &SnapshotStore<S>,
    track_id: &TrackId,
) -> Result<bool, FanoutError> {
    let Some(found) = TrackingRepository::new(pool)
        .get_tracking_request(track_id)
        .await?
    else {
        warn!("tracking request not found");
        return Ok(false);
    };

    let snapshot = snapshots.load().await?;
    if !snapshot_shows_available(&snapshot, &found.substore_id, &found.product.id) {
        return Ok(false);
    }

    let batch = NotificationBatch {
        user: found.user,
        products: vec![found.product],
    };
    let payload = serde_json::to_value(&batch)?;
    JobRepository::new(pool)
        .enqueue(JOB_PRODUCT_BACK_IN_STOCK, &payload)
        .await?;

    info!(user = %batch.user.email, "enqueued single-track notification");
    Ok(true)
}

/// Whether the last persisted snapshot shows a product as available in a
/// substore. A substore or product the snapshot has never seen counts as
/// unavailable.
fn snapshot_shows_available(
    snapshot: &InventorySnapshot,
    substore_id: &SubstoreId,
    product_id: &ProductId,
) -> bool {
    snapshot.get(substore_id).is_some_and(|entries| {
        entries
            .iter()
            .any(|entry| entry.product_id == *product_id && entry.available)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shelfwatch_core::{Email, Product, TrackedUser};

    use super::*;

    fn entry(user_id: &str, product_id: &str, substore_id: &str) -> TrackingMatch {
        TrackingMatch {
            user: TrackedUser {
                id: UserId::new(user_id),
                name: format!("User {user_id}"),
                email: Email::parse(&format!("{user_id}@example.com")).unwrap(),
            },
            product: Product {
                id: ProductId::new(product_id),
                alias: format!("{product_id}-alias"),
                sku: format!("SKU-{product_id}"),
                name: format!("Product {product_id}"),
                description: None,
                image: None,
                usual_price: 250,
            },
            substore_id: SubstoreId::new(substore_id),
        }
    }

    #[test]
    fn test_one_batch_per_user() {
        let matches = vec![
            entry("usr_b", "p1", "sub_d"),
            entry("usr_a", "p1", "sub_d"),
            entry("usr_b", "p2", "sub_m"),
        ];

        let batches = group_by_user(matches);
        assert_eq!(batches.len(), 2);

        // Ordered by user id, products in match order.
        assert_eq!(batches[0].user.id, UserId::new("usr_a"));
        assert_eq!(batches[0].products.len(), 1);

        assert_eq!(batches[1].user.id, UserId::new("usr_b"));
        let product_ids: Vec<&str> = batches[1]
            .products
            .iter()
            .map(|product| product.id.as_str())
            .collect();
        assert_eq!(product_ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_batches_are_never_empty() {
        let batches = group_by_user(vec![entry("usr_a", "p1", "sub_d")]);
        assert_eq!(batches.len(), 1);
        assert!(!batches[0].products.is_empty());
    }

    #[test]
    fn test_no_matches_no_batches() {
        assert!(group_by_user(Vec::new()).is_empty());
    }

    #[test]
    fn test_snapshot_availability_check() {
        use shelfwatch_core::ProductAvailability;

        let mut snapshot = InventorySnapshot::new();
        snapshot.insert(
            SubstoreId::new("sub_d"),
            vec![
                ProductAvailability::new("p1", true),
                ProductAvailability::new("p2", false),
            ],
        );

        let sub_d = SubstoreId::new("sub_d");
        assert!(snapshot_shows_available(
            &snapshot,
            &sub_d,
            &ProductId::new("p1")
        ));
        assert!(!snapshot_shows_available(
            &snapshot,
            &sub_d,
            &ProductId::new("p2")
        ));
        assert!(!snapshot_shows_available(
            &snapshot,
            &sub_d,
            &ProductId::new("p_unknown")
        ));
        assert!(!snapshot_shows_available(
            &snapshot,
            &SubstoreId::new("sub_unknown"),
            &ProductId::new("p1")
        ));
    }
}
