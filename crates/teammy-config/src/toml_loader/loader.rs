//! Reading `TeammyConfig` from TOML.

use std::path::Path;

use teammy_common::ConfigError;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};
use crate::schema::TeammyConfig;
use crate::validation;

/// Load config from `path`.
///
/// Missing fields take their defaults. A config that fails validation is
/// still returned; the violations are logged.
pub fn load_from_path(path: &Path) -> Result<TeammyConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "cannot read {}: {e}",
                path.display()
            )));
        }
    };

    let config: TeammyConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), error = %e, "Config has invalid values");
    }

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Load `<config_dir>/teammy/config.toml`, writing the commented template
/// and returning defaults when it does not exist yet.
pub fn load_default() -> Result<TeammyConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(TeammyConfig::default())
        }
        other => other,
    }
}
