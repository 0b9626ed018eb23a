//! Key-value cache backing the substore directory and inventory snapshot.
//!
//! The cache lives in the shared `PostgreSQL` database (`kv_cache` table) so
//! that poller restarts keep their resolved substores and last snapshot.
//! Values are JSON documents encoded by the callers; the store itself is
//! format-agnostic.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur when reading or writing the cache.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored document failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Durable string-to-string cache.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// `PostgreSQL`-backed cache over the `kv_cache` table.
#[derive(Clone)]
pub struct PgKvStore {
    pool: PgPool,
}

impl PgKvStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl KeyValueStore for PgKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_cache WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO kv_cache (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// In-memory cache for tests and local one-off runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKvStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_get_missing() {
        let store = InMemoryKvStore::new();
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_in_memory_set_then_get() {
        let store = InMemoryKvStore::new();
        store.set("k", "v1").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_in_memory_set_overwrites() {
        let store = InMemoryKvStore::new();
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = InMemoryKvStore::new();
        let view = store.clone();
        store.set("k", "v").await.unwrap();
        assert_eq!(view.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
