//! Poll cycle driver.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use shelfwatch_core::{
    InventorySnapshot, ProductAvailability, ProductId, SessionCookies, SubstoreId,
};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::directory::SubstoreDirectory;
use crate::fanout;
use crate::kv::{KeyValueStore, StoreError};
use crate::session::SessionClient;
use crate::snapshot::SnapshotStore;

use super::diff;

/// Errors that can fail a poll cycle outright.
///
/// Fetch problems are absorbed per substore and never land here; only the
/// backing store can fail a cycle.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Inventory source for the poll cycle.
///
/// The engine needs only the retrying fetch, so the seam keeps cycle tests
/// off the network.
pub trait InventoryFetcher: Send + Sync {
    /// Fetch inventory for one substore, folding cookies through retries.
    fn fetch_with_retry(
        &self,
        substore_id: &SubstoreId,
        cookies: SessionCookies,
    ) -> impl Future<Output = (Vec<ProductAvailability>, SessionCookies)> + Send;
}

impl InventoryFetcher for SessionClient {
    async fn fetch_with_retry(
        &self,
        substore_id: &SubstoreId,
        cookies: SessionCookies,
    ) -> (Vec<ProductAvailability>, SessionCookies) {
        self.fetch_inventory_with_retry(substore_id, cookies).await
    }
}

/// What one poll cycle observed.
#[derive(Debug)]
pub struct CycleOutcome {
    /// Products that flipped to available this cycle, per substore.
    pub newly_available: BTreeMap<SubstoreId, Vec<ProductId>>,
    /// Substores polled this cycle.
    pub substores_polled: usize,
    /// Substores that produced no data after retries.
    pub substores_empty: usize,
}

/// Polls every known substore, diffs against the stored snapshot, and
/// persists the merge.
pub struct PollEngine<S, F> {
    directory: SubstoreDirectory<S>,
    snapshots: SnapshotStore<S>,
    fetcher: F,
}

impl<S: KeyValueStore, F: InventoryFetcher> PollEngine<S, F> {
    pub const fn new(
        directory: SubstoreDirectory<S>,
        snapshots: SnapshotStore<S>,
        fetcher: F,
    ) -> Self {
        Self {
            directory,
            snapshots,
            fetcher,
        }
    }

    /// Run one poll cycle.
    ///
    /// Substores are fetched concurrently; a substore that yields nothing is
    /// counted but keeps its previous snapshot entry. The merged snapshot is
    /// persisted every cycle, flips or not, and rotated cookie jars go back
    /// to the substore directory.
    ///
    /// # Errors
    ///
    /// Returns error when the key-value store fails.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleOutcome, PollError> {
        let identities = self.directory.all().await?;
        if identities.is_empty() {
            info!("no substores known yet, nothing to poll");
            return Ok(CycleOutcome {
                newly_available: BTreeMap::new(),
                substores_polled: 0,
                substores_empty: 0,
            });
        }

        let previous = self.snapshots.load().await?;

        let fetches = identities.iter().map(|identity| async move {
            let (entries, cookies) = self
                .fetcher
                .fetch_with_retry(&identity.substore_id, identity.cookies.clone())
                .await;
            (identity, entries, cookies)
        });
        let results = futures::future::join_all(fetches).await;

        let mut current = InventorySnapshot::new();
        let mut rotated = BTreeMap::new();
        let mut substores_empty = 0usize;
        for (identity, entries, cookies) in results {
            if entries.is_empty() {
                warn!(substore = %identity.substore_id, "no inventory data this cycle");
                substores_empty += 1;
            } else {
                current.insert(identity.substore_id.clone(), entries);
            }
            if cookies != identity.cookies {
                rotated.insert(identity.substore_name.clone(), cookies);
            }
        }

        let newly_available = diff::newly_available(&previous, &current);
        let merged = diff::merge(&previous, &current);
        self.snapshots.replace(&merged).await?;
        self.directory.update_cookies(&rotated).await?;

        let outcome = CycleOutcome {
            newly_available,
            substores_polled: identities.len(),
            substores_empty,
        };
        info!(
            substores = outcome.substores_polled,
            empty = outcome.substores_empty,
            flips = outcome.newly_available.values().map(Vec::len).sum::<usize>(),
            "poll cycle complete"
        );
        Ok(outcome)
    }
}

/// Poll on a fixed interval until shutdown.
///
/// Cycles never overlap: the next tick is not serviced until the previous
/// cycle's persist and fan-out steps complete. A failed cycle is logged and
/// the loop keeps going.
pub async fn run_poll_loop<S, F>(
    engine: &PollEngine<S, F>,
    pool: &PgPool,
    period: Duration,
    shutdown: impl Future<Output = ()>,
) where
    S: KeyValueStore,
    F: InventoryFetcher,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match engine.run_cycle().await {
                    Ok(outcome) if !outcome.newly_available.is_empty() => {
                        if let Err(e) =
                            fanout::dispatch_notifications(pool, &outcome.newly_available).await
                        {
                            error!(error = %e, "notification dispatch failed");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "poll cycle failed"),
                }
            }
            () = &mut shutdown => {
                info!("shutdown signal received, stopping poll loop");
                break;
            }
        }
    }
}
