//! Teammy configuration system.
//!
//! TOML-based configuration for the realtime client and its tooling. All
//! config sections use sensible defaults so partial configs work out of
//! the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use teammy_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! let json = config_to_json(&config);
//! println!("{json}");
//! ```

pub mod env;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use env::{apply_env_overrides, API_BASE_URL_ENV};
pub use schema::{
    AuthConfig, LogLevel, LoggingConfig, RealtimeConfig, ReconnectConfig, TeammyConfig,
};

use std::path::Path;

use teammy_common::ConfigError;

/// Load config from the platform default path.
///
/// Loads `config.toml` from the OS config directory, creates a default if
/// none exists, applies environment overrides, and validates the result.
pub fn load_config() -> Result<TeammyConfig, ConfigError> {
    let mut config = toml_loader::load_default()?;
    apply_env_overrides(&mut config);
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit file, with the same overrides and
/// validation as [`load_config`].
pub fn load_config_from(path: &Path) -> Result<TeammyConfig, ConfigError> {
    let mut config = toml_loader::load_from_path(path)?;
    apply_env_overrides(&mut config);
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &TeammyConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
