//! Pincode resolution command.
//!
//! # Usage
//!
//! ```bash
//! shelfwatch resolve 380001
//! ```
//!
//! Resolves the pincode through the cached directory or, on a miss, the
//! storefront handshake, and prints the substore identity. The mapping is
//! persisted either way, so the poller picks the substore up on its next
//! cycle.

use shelfwatch_core::{Pincode, PincodeError};
use shelfwatch_poller::config::{ConfigError, PollerConfig};
use shelfwatch_poller::db;
use shelfwatch_poller::directory::{SubstoreDirectory, SubstoreResolver};
use shelfwatch_poller::kv::PgKvStore;
use shelfwatch_poller::session::{ResolveError, SessionClient, SessionError};
use thiserror::Error;

/// Errors that can occur while resolving a pincode.
#[derive(Debug, Error)]
pub enum ResolveCommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The input is not a valid pincode.
    #[error("Invalid pincode: {0}")]
    Pincode(#[from] PincodeError),

    /// The storefront session client could not be built.
    #[error("Session client error: {0}")]
    Session(#[from] SessionError),

    /// Resolution against the storefront failed.
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),
}

/// Resolve a pincode and print the substore serving it.
///
/// # Errors
///
/// Returns `ResolveCommandError` if the pincode is invalid, configuration or
/// the database is unavailable, or the handshake fails.
pub async fn run(raw_pincode: &str) -> Result<(), ResolveCommandError> {
    let pincode = Pincode::parse(raw_pincode)?;

    let config = PollerConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let client = SessionClient::new(&config.storefront)?;

    let kv = PgKvStore::new(pool);
    let directory = SubstoreDirectory::new(kv);
    let resolver = SubstoreResolver::new(&client, &directory);

    tracing::info!("Resolving pincode {pincode}...");
    let identity = resolver.resolve(&pincode).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("pincode:  {pincode}");
        println!("substore: {}", identity.substore_name);
        println!("id:       {}", identity.substore_id);
    }

    Ok(())
}
