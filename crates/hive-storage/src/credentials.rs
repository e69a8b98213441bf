//! High-level API for the persisted bearer credential.

use crate::{DurableStorage, StorageKeys, StorageResult};
use std::sync::Arc;

/// The single persisted credential slot.
///
/// An empty stored value is indistinguishable from no value: readers see
/// `None`, and writing an empty token clears the slot.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn DurableStorage>,
}

impl CredentialStore {
    /// Create a credential store over the given storage backend
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self { storage }
    }

    /// Retrieve the access token
    pub fn get_access_token(&self) -> StorageResult<Option<String>> {
        Ok(self
            .storage
            .get(StorageKeys::ACCESS_TOKEN)?
            .filter(|token| !token.is_empty()))
    }

    /// Store the access token, replacing any previous one
    pub fn set_access_token(&self, token: &str) -> StorageResult<()> {
        if token.is_empty() {
            tracing::debug!("Empty access token written, clearing slot instead");
            self.clear_access_token()?;
            return Ok(());
        }
        self.storage.set(StorageKeys::ACCESS_TOKEN, token)
    }

    /// Remove the access token. Returns true if one was stored.
    pub fn clear_access_token(&self) -> StorageResult<bool> {
        self.storage.delete(StorageKeys::ACCESS_TOKEN)
    }

    /// Check if a non-empty access token exists
    pub fn has_access_token(&self) -> StorageResult<bool> {
        Ok(self.get_access_token()?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    fn store() -> (Arc<MemoryStorage>, CredentialStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = CredentialStore::new(storage.clone());
        (storage, store)
    }

    #[test]
    fn test_set_get_clear() {
        let (_, store) = store();
        assert!(!store.has_access_token().unwrap());

        store.set_access_token("T1").unwrap();
        assert_eq!(store.get_access_token().unwrap(), Some("T1".to_string()));
        assert!(store.has_access_token().unwrap());

        store.set_access_token("T2").unwrap();
        assert_eq!(store.get_access_token().unwrap(), Some("T2".to_string()));

        assert!(store.clear_access_token().unwrap());
        assert_eq!(store.get_access_token().unwrap(), None);
        assert!(!store.clear_access_token().unwrap());
    }

    #[test]
    fn test_empty_value_reads_as_absent() {
        let (storage, store) = store();
        storage.set(StorageKeys::ACCESS_TOKEN, "").unwrap();

        assert_eq!(store.get_access_token().unwrap(), None);
        assert!(!store.has_access_token().unwrap());
    }

    #[test]
    fn test_writing_empty_token_clears_slot() {
        let (storage, store) = store();
        store.set_access_token("T1").unwrap();
        store.set_access_token("").unwrap();

        assert_eq!(storage.get(StorageKeys::ACCESS_TOKEN).unwrap(), None);
    }

    #[test]
    fn test_clones_share_backend() {
        let (_, store) = store();
        let other = store.clone();
        store.set_access_token("shared").unwrap();
        assert_eq!(other.get_access_token().unwrap(), Some("shared".to_string()));
    }
}
