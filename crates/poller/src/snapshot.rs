//! Persisted inventory snapshot.

use shelfwatch_core::InventorySnapshot;
use tracing::warn;

use crate::kv::{KeyValueStore, StoreError};

/// Key holding the inventory snapshot document.
const SNAPSHOT_KEY: &str = "inventory:snapshot";

/// Store-backed record of the last known availability per substore.
#[derive(Debug, Clone)]
pub struct SnapshotStore<S> {
    store: S,
}

impl<S: KeyValueStore> SnapshotStore<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Load the previous snapshot.
    ///
    /// A missing document is an empty snapshot (first run ever). A corrupt
    /// document is logged and also treated as empty rather than wedging the
    /// poll loop; the next cycle writes a fresh one.
    ///
    /// # Errors
    ///
    /// Returns error only when the store itself fails.
    pub async fn load(&self) -> Result<InventorySnapshot, StoreError> {
        let Some(raw) = self.store.get(SNAPSHOT_KEY).await? else {
            return Ok(InventorySnapshot::new());
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(error = %e, "discarding corrupt inventory snapshot");
                Ok(InventorySnapshot::new())
            }
        }
    }

    /// Replace the snapshot document as a whole.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the snapshot cannot be encoded.
    pub async fn replace(&self, snapshot: &InventorySnapshot) -> Result<(), StoreError> {
        self.store
            .set(SNAPSHOT_KEY, &serde_json::to_string(snapshot)?)
            .await
    }
}
