//! Durable client-side storage for HiveBooks.
//!
//! The web client keeps its bearer token in `localStorage`; this crate
//! provides the same contract for native front ends:
//! - [`DurableStorage`]: string key-value slots
//! - [`FileStorage`]: a JSON file under `~/.hivebooks`, surviving restarts
//! - [`MemoryStorage`]: process-local, for tests and ephemeral sessions
//! - [`CredentialStore`]: the single persisted bearer-token slot

mod credentials;
mod file;
mod keys;
mod memory;
mod traits;

pub use credentials::CredentialStore;
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::DurableStorage;

use hive_config_and_utils::Paths;
use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default file-backed storage at `paths.storage_file()`.
pub fn create_storage(paths: &Paths) -> Arc<dyn DurableStorage> {
    Arc::new(FileStorage::new(paths.storage_file()))
}

/// Create a credential store over the default file-backed storage.
pub fn create_credential_store(paths: &Paths) -> CredentialStore {
    CredentialStore::new(create_storage(paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_credential_store_uses_storage_file() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let store = create_credential_store(&paths);
        store.set_access_token("tok-1").unwrap();

        assert!(paths.storage_file().exists());
        let reopened = create_credential_store(&paths);
        assert_eq!(reopened.get_access_token().unwrap(), Some("tok-1".to_string()));
    }

    #[test]
    fn test_storage_keys_constants() {
        assert_eq!(StorageKeys::ACCESS_TOKEN, "hive_token");
    }
}
