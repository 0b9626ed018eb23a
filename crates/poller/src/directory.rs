//! Cached pincode and substore mappings.
//!
//! Two documents live in the key-value store: `substore:pincodes` maps a
//! pincode to the substore serving it, and `substore:directory` maps a
//! substore name to its identity and the cookie jar bound to it. Several
//! pincodes can point at the same substore, so the jar is stored once per
//! substore rather than per pincode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use shelfwatch_core::{Pincode, SessionCookies, SubstoreId, SubstoreIdentity};
use tracing::{debug, info, instrument};

use crate::kv::{KeyValueStore, StoreError};
use crate::session::{Handshake, ResolveError, SessionClient};

/// Key holding the pincode map.
const PINCODES_KEY: &str = "substore:pincodes";

/// Key holding the substore directory.
const DIRECTORY_KEY: &str = "substore:directory";

#[derive(Debug, Serialize, Deserialize)]
struct PincodeEntry {
    substore_name: String,
    substore_id: SubstoreId,
}

#[derive(Debug, Serialize, Deserialize)]
struct DirectoryEntry {
    substore_id: SubstoreId,
    #[serde(default)]
    cookies: SessionCookies,
}

/// Store-backed directory of known substores and the pincodes they serve.
#[derive(Debug, Clone)]
pub struct SubstoreDirectory<S> {
    store: S,
}

impl<S: KeyValueStore> SubstoreDirectory<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Cached identity serving a pincode, if the pincode was seen before.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or holds a corrupt document.
    pub async fn find_by_pincode(
        &self,
        pincode: &Pincode,
    ) -> Result<Option<SubstoreIdentity>, StoreError> {
        let pincodes: BTreeMap<String, PincodeEntry> = self.load_map(PINCODES_KEY).await?;
        let Some(entry) = pincodes.get(pincode.as_str()) else {
            return Ok(None);
        };

        let directory: BTreeMap<String, DirectoryEntry> = self.load_map(DIRECTORY_KEY).await?;
        let cookies = directory
            .get(&entry.substore_name)
            .map(|found| found.cookies.clone())
            .unwrap_or_default();

        Ok(Some(SubstoreIdentity {
            substore_id: entry.substore_id.clone(),
            substore_name: entry.substore_name.clone(),
            cookies,
        }))
    }

    /// Cached identity for a substore name.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or holds a corrupt document.
    pub async fn find_by_name(
        &self,
        substore_name: &str,
    ) -> Result<Option<SubstoreIdentity>, StoreError> {
        let directory: BTreeMap<String, DirectoryEntry> = self.load_map(DIRECTORY_KEY).await?;
        Ok(directory.get(substore_name).map(|entry| SubstoreIdentity {
            substore_id: entry.substore_id.clone(),
            substore_name: substore_name.to_owned(),
            cookies: entry.cookies.clone(),
        }))
    }

    /// Record which substore serves a pincode.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or holds a corrupt document.
    pub async fn link_pincode(
        &self,
        pincode: &Pincode,
        identity: &SubstoreIdentity,
    ) -> Result<(), StoreError> {
        let mut pincodes: BTreeMap<String, PincodeEntry> = self.load_map(PINCODES_KEY).await?;
        pincodes.insert(
            pincode.as_str().to_owned(),
            PincodeEntry {
                substore_name: identity.substore_name.clone(),
                substore_id: identity.substore_id.clone(),
            },
        );
        self.save_map(PINCODES_KEY, &pincodes).await
    }

    /// Insert a substore identity, or refresh it if the name is known.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or holds a corrupt document.
    pub async fn upsert_identity(&self, identity: &SubstoreIdentity) -> Result<(), StoreError> {
        let mut directory: BTreeMap<String, DirectoryEntry> = self.load_map(DIRECTORY_KEY).await?;
        directory.insert(
            identity.substore_name.clone(),
            DirectoryEntry {
                substore_id: identity.substore_id.clone(),
                cookies: identity.cookies.clone(),
            },
        );
        self.save_map(DIRECTORY_KEY, &directory).await
    }

    /// All known substore identities, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or holds a corrupt document.
    pub async fn all(&self) -> Result<Vec<SubstoreIdentity>, StoreError> {
        let directory: BTreeMap<String, DirectoryEntry> = self.load_map(DIRECTORY_KEY).await?;
        Ok(directory
            .into_iter()
            .map(|(substore_name, entry)| SubstoreIdentity {
                substore_id: entry.substore_id,
                substore_name,
                cookies: entry.cookies,
            })
            .collect())
    }

    /// Apply rotated cookie jars after a poll cycle, keyed by substore name.
    ///
    /// Names without a directory entry are skipped; the whole batch lands in
    /// one store write.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or holds a corrupt document.
    pub async fn update_cookies(
        &self,
        rotated: &BTreeMap<String, SessionCookies>,
    ) -> Result<(), StoreError> {
        if rotated.is_empty() {
            return Ok(());
        }

        let mut directory: BTreeMap<String, DirectoryEntry> = self.load_map(DIRECTORY_KEY).await?;
        for (substore_name, cookies) in rotated {
            if let Some(entry) = directory.get_mut(substore_name) {
                entry.cookies = cookies.clone();
            }
        }
        self.save_map(DIRECTORY_KEY, &directory).await
    }

    async fn load_map<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<BTreeMap<String, T>, StoreError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn save_map<T: Serialize>(
        &self,
        key: &str,
        map: &BTreeMap<String, T>,
    ) -> Result<(), StoreError> {
        self.store.set(key, &serde_json::to_string(map)?).await
    }
}

/// Resolves a pincode to a bound substore identity, caching every step.
///
/// A cached pincode skips the handshake entirely. On a miss the handshake
/// runs only as far as needed: a pincode that resolves to an already-known
/// substore stops after name resolution and reuses the cached identity
/// instead of binding a fresh session.
pub struct SubstoreResolver<'a, S> {
    client: &'a SessionClient,
    directory: &'a SubstoreDirectory<S>,
}

impl<'a, S: KeyValueStore> SubstoreResolver<'a, S> {
    pub const fn new(client: &'a SessionClient, directory: &'a SubstoreDirectory<S>) -> Self {
        Self { client, directory }
    }

    /// Resolve the substore identity serving a pincode.
    ///
    /// # Errors
    ///
    /// Returns error when the handshake fails, the pincode is not served by
    /// any substore, or the directory store fails.
    #[instrument(skip(self), fields(pincode = %pincode))]
    pub async fn resolve(&self, pincode: &Pincode) -> Result<SubstoreIdentity, ResolveError> {
        if let Some(identity) = self.directory.find_by_pincode(pincode).await? {
            debug!(substore = %identity.substore_id, "pincode cache hit");
            return Ok(identity);
        }

        let mut state = Handshake::begin(pincode.clone());
        loop {
            state = match self.client.advance(state).await? {
                Handshake::NameResolved { substore_name } => {
                    if let Some(identity) = self.directory.find_by_name(&substore_name).await? {
                        self.directory.link_pincode(pincode, &identity).await?;
                        debug!(substore = %identity.substore_id, "substore directory hit");
                        return Ok(identity);
                    }
                    Handshake::NameResolved { substore_name }
                }
                Handshake::Bound {
                    substore_id,
                    substore_name,
                } => {
                    let identity = SubstoreIdentity {
                        substore_id,
                        substore_name,
                        cookies: self.client.current_cookies().await,
                    };
                    self.directory.upsert_identity(&identity).await?;
                    self.directory.link_pincode(pincode, &identity).await?;
                    info!(substore = %identity.substore_id, "bound new substore");
                    return Ok(identity);
                }
                other => other,
            };
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKvStore;

    fn identity(id: &str, name: &str, cookies: &str) -> SubstoreIdentity {
        SubstoreIdentity {
            substore_id: SubstoreId::new(id),
            substore_name: name.to_owned(),
            cookies: SessionCookies::new(cookies),
        }
    }

    #[tokio::test]
    async fn test_unknown_pincode_is_none() {
        let directory = SubstoreDirectory::new(InMemoryKvStore::default());
        let pincode: Pincode = "110001".parse().unwrap();
        assert!(directory.find_by_pincode(&pincode).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_link_and_find_roundtrip() {
        let directory = SubstoreDirectory::new(InMemoryKvStore::default());
        let pincode: Pincode = "110001".parse().unwrap();
        let delhi = identity("sub_delhi", "delhi", "jar=d1");

        directory.upsert_identity(&delhi).await.unwrap();
        directory.link_pincode(&pincode, &delhi).await.unwrap();

        let found = directory.find_by_pincode(&pincode).await.unwrap().unwrap();
        assert_eq!(found, delhi);
        let by_name = directory.find_by_name("delhi").await.unwrap().unwrap();
        assert_eq!(by_name, delhi);
    }

    #[tokio::test]
    async fn test_cookies_live_in_the_directory_not_the_pincode_map() {
        let directory = SubstoreDirectory::new(InMemoryKvStore::default());
        let first: Pincode = "110001".parse().unwrap();
        let second: Pincode = "110002".parse().unwrap();
        let delhi = identity("sub_delhi", "delhi", "jar=v1");

        directory.upsert_identity(&delhi).await.unwrap();
        directory.link_pincode(&first, &delhi).await.unwrap();
        directory.link_pincode(&second, &delhi).await.unwrap();

        // A refreshed jar shows up under every linked pincode.
        let refreshed = identity("sub_delhi", "delhi", "jar=v2");
        directory.upsert_identity(&refreshed).await.unwrap();

        for pincode in [&first, &second] {
            let found = directory.find_by_pincode(pincode).await.unwrap().unwrap();
            assert_eq!(found.cookies, SessionCookies::new("jar=v2"));
        }
    }

    #[tokio::test]
    async fn test_linked_pincode_without_directory_entry_defaults_cookies() {
        let directory = SubstoreDirectory::new(InMemoryKvStore::default());
        let pincode: Pincode = "382007".parse().unwrap();
        let gujarat = identity("sub_guj", "gujarat", "jar=g1");

        // Pincode linked but the directory document never written.
        directory.link_pincode(&pincode, &gujarat).await.unwrap();

        let found = directory.find_by_pincode(&pincode).await.unwrap().unwrap();
        assert_eq!(found.substore_id, gujarat.substore_id);
        assert!(found.cookies.is_empty());
    }

    #[tokio::test]
    async fn test_all_orders_by_name() {
        let directory = SubstoreDirectory::new(InMemoryKvStore::default());
        directory
            .upsert_identity(&identity("sub_m", "mumbai", ""))
            .await
            .unwrap();
        directory
            .upsert_identity(&identity("sub_d", "delhi", ""))
            .await
            .unwrap();

        let names: Vec<String> = directory
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|found| found.substore_name)
            .collect();
        assert_eq!(names, vec!["delhi".to_owned(), "mumbai".to_owned()]);
    }

    #[tokio::test]
    async fn test_update_cookies_skips_unknown_names() {
        let directory = SubstoreDirectory::new(InMemoryKvStore::default());
        directory
            .upsert_identity(&identity("sub_d", "delhi", "jar=old"))
            .await
            .unwrap();

        let mut rotated = BTreeMap::new();
        rotated.insert("delhi".to_owned(), SessionCookies::new("jar=new"));
        rotated.insert("ghost".to_owned(), SessionCookies::new("jar=x"));
        directory.update_cookies(&rotated).await.unwrap();

        let delhi = directory.find_by_name("delhi").await.unwrap().unwrap();
        assert_eq!(delhi.cookies, SessionCookies::new("jar=new"));
        assert!(directory.find_by_name("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let store = InMemoryKvStore::default();
        store.set(PINCODES_KEY, "not json").await.unwrap();

        let directory = SubstoreDirectory::new(store);
        let pincode: Pincode = "110001".parse().unwrap();
        assert!(matches!(
            directory.find_by_pincode(&pincode).await,
            Err(StoreError::Codec(_))
        ));
    }
}
