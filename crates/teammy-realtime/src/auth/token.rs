//! Bearer token provider backed by a key/value store.

use std::sync::Arc;

use tracing::debug;

use super::storage::KeyValueStore;

/// Supplies the bearer token for each connection attempt.
///
/// Implementations never fail; "no token" is the empty string.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> String;
}

impl<F> TokenProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn access_token(&self) -> String {
        self()
    }
}

/// Reads the token the web login flow persists.
///
/// The primary key holds a JSON object carrying `accessToken` or
/// `access_token`; the fallback key holds the raw token.
pub struct StorageTokenProvider {
    store: Arc<dyn KeyValueStore>,
    primary_key: String,
    fallback_key: String,
}

impl StorageTokenProvider {
    pub const DEFAULT_PRIMARY_KEY: &'static str = "userInfo";
    pub const DEFAULT_FALLBACK_KEY: &'static str = "token";

    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_keys(store, Self::DEFAULT_PRIMARY_KEY, Self::DEFAULT_FALLBACK_KEY)
    }

    pub fn with_keys(
        store: Arc<dyn KeyValueStore>,
        primary_key: impl Into<String>,
        fallback_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            primary_key: primary_key.into(),
            fallback_key: fallback_key.into(),
        }
    }

    fn from_primary(&self) -> Option<String> {
        let raw = match self.store.get_item(&self.primary_key) {
            Ok(raw) => raw?,
            Err(e) => {
                debug!(key = %self.primary_key, error = %e, "token storage unavailable");
                return None;
            }
        };
        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %self.primary_key, error = %e, "stored auth entry is not JSON");
                return None;
            }
        };
        ["accessToken", "access_token"]
            .iter()
            .filter_map(|field| value.get(field).and_then(|t| t.as_str()))
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string)
    }

    fn from_fallback(&self) -> Option<String> {
        match self.store.get_item(&self.fallback_key) {
            Ok(raw) => raw
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            Err(e) => {
                debug!(key = %self.fallback_key, error = %e, "token storage unavailable");
                None
            }
        }
    }
}

impl TokenProvider for StorageTokenProvider {
    fn access_token(&self) -> String {
        self.from_primary()
            .or_else(|| self.from_fallback())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for StorageTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageTokenProvider")
            .field("primary_key", &self.primary_key)
            .field("fallback_key", &self.fallback_key)
            .finish()
    }
}
