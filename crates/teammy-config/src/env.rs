//! Environment variable overrides applied on top of the TOML file.

use tracing::info;

use crate::schema::TeammyConfig;

/// Overrides `realtime.api_base_url`.
pub const API_BASE_URL_ENV: &str = "TEAMMY_API_BASE_URL";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut TeammyConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from<F>(config: &mut TeammyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(API_BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
        info!(url = %url, "api base url overridden from {API_BASE_URL_ENV}");
        config.realtime.api_base_url = url.trim().to_string();
    }
}
