//! Persisted token storage settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the bearer token lives and which keys hold it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Storage file; empty selects the platform data directory.
    pub storage_path: String,
    /// Key holding a JSON object with `accessToken` or `access_token`.
    pub primary_key: String,
    /// Key holding the raw token.
    pub fallback_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            storage_path: String::new(),
            primary_key: "userInfo".into(),
            fallback_key: "token".into(),
        }
    }
}

impl AuthConfig {
    /// Resolve the storage file, falling back to `<data_dir>/teammy/storage.json`.
    pub fn resolved_storage_path(&self) -> Option<PathBuf> {
        if !self.storage_path.trim().is_empty() {
            return Some(PathBuf::from(self.storage_path.trim()));
        }
        dirs::data_dir().map(|dir| dir.join("teammy").join("storage.json"))
    }
}
