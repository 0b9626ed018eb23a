//! One-shot poll command.
//!
//! # Usage
//!
//! ```bash
//! shelfwatch poll-once
//! ```
//!
//! Runs a single poll cycle against every known substore and enqueues
//! notification jobs for any products that flipped to available. Useful for
//! checking a deployment without waiting out the daemon interval.

use shelfwatch_poller::config::{ConfigError, PollerConfig};
use shelfwatch_poller::db;
use shelfwatch_poller::directory::SubstoreDirectory;
use shelfwatch_poller::fanout::{self, FanoutError};
use shelfwatch_poller::kv::PgKvStore;
use shelfwatch_poller::poll::{PollEngine, PollError};
use shelfwatch_poller::session::{SessionClient, SessionError};
use shelfwatch_poller::snapshot::SnapshotStore;
use thiserror::Error;

/// Errors that can occur during a one-shot poll.
#[derive(Debug, Error)]
pub enum PollCommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The storefront session client could not be built.
    #[error("Session client error: {0}")]
    Session(#[from] SessionError),

    /// The poll cycle failed.
    #[error("Poll cycle error: {0}")]
    Poll(#[from] PollError),

    /// Notification fan-out failed.
    #[error("Notification dispatch error: {0}")]
    Fanout(#[from] FanoutError),
}

/// Run one poll cycle and dispatch notifications for any flips.
///
/// # Errors
///
/// Returns `PollCommandError` if configuration, the database, the cycle, or
/// the fan-out fails.
pub async fn run_once() -> Result<(), PollCommandError> {
    let config = PollerConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let client = SessionClient::new(&config.storefront)?;

    let kv = PgKvStore::new(pool.clone());
    let engine = PollEngine::new(
        SubstoreDirectory::new(kv.clone()),
        SnapshotStore::new(kv),
        client,
    );

    let outcome = engine.run_cycle().await?;

    let enqueued = if outcome.newly_available.is_empty() {
        0
    } else {
        fanout::dispatch_notifications(&pool, &outcome.newly_available).await?
    };

    #[allow(clippy::print_stdout)]
    {
        println!("substores polled: {}", outcome.substores_polled);
        println!("substores empty:  {}", outcome.substores_empty);
        println!(
            "restock flips:    {}",
            outcome.newly_available.values().map(Vec::len).sum::<usize>()
        );
        println!("jobs enqueued:    {enqueued}");
    }

    Ok(())
}
