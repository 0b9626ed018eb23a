//! Single-track notification command.
//!
//! # Usage
//!
//! ```bash
//! shelfwatch notify-track 6f2db6a1-8c7e-4b7a-9f93-0a1f4f1f2e3d
//! ```
//!
//! The recurring poll only reports availability transitions, so a tracking
//! request created while the product is already in stock would hear nothing
//! until the product sold out and came back. The web app invokes this check
//! after creating a track; the command replays it by hand.

use shelfwatch_core::TrackId;
use shelfwatch_poller::config::{ConfigError, PollerConfig};
use shelfwatch_poller::db;
use shelfwatch_poller::fanout::{self, FanoutError};
use shelfwatch_poller::kv::PgKvStore;
use shelfwatch_poller::snapshot::SnapshotStore;
use thiserror::Error;

/// Errors that can occur while backfilling a notification.
#[derive(Debug, Error)]
pub enum NotifyCommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Lookup, snapshot read, or enqueue failed.
    #[error("Notification error: {0}")]
    Fanout(#[from] FanoutError),
}

/// Enqueue a notification for one tracking request if the tracked product is
/// currently available.
///
/// # Errors
///
/// Returns `NotifyCommandError` if configuration or the database is
/// unavailable, or the check fails.
pub async fn run(track_id: &str) -> Result<(), NotifyCommandError> {
    let config = PollerConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let snapshots = SnapshotStore::new(PgKvStore::new(pool.clone()));

    let track_id = TrackId::from(track_id);
    let enqueued = fanout::notify_single_track(&pool, &snapshots, &track_id).await?;

    #[allow(clippy::print_stdout)]
    {
        if enqueued {
            println!("notification enqueued for track {track_id}");
        } else {
            println!("no notification needed for track {track_id}");
        }
    }

    Ok(())
}
