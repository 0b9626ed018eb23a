//! Database operations for the tracker `PostgreSQL`.
//!
//! ## Tables
//!
//! - `users` - Notification recipients (written by the web app)
//! - `products` - Mirrored catalog products (written by the web app)
//! - `tracks` - Tracking requests joining user, product and substore
//! - `kv_cache` - Key-value documents (substore directory, inventory snapshot)
//! - `notification_jobs` - Durable delivery queue consumed by the worker
//!
//! # Migrations
//!
//! Migrations are stored in `crates/poller/migrations/` and run via:
//! ```bash
//! cargo run -p shelfwatch-cli -- migrate
//! ```

pub mod jobs;
pub mod tracking;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use jobs::JobRepository;
pub use tracking::TrackingRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
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
