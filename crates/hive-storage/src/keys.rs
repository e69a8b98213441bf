//! Storage key constants.

/// Storage keys used by the client.
pub struct StorageKeys;

impl StorageKeys {
    /// Bearer access token. Same key the web client uses in `localStorage`.
    pub const ACCESS_TOKEN: &'static str = "hive_token";
}
