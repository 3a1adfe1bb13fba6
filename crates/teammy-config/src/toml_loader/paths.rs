//! Where the config file lives and how the first one is written.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use teammy_common::ConfigError;
use tracing::info;

use super::template::default_config_toml;

const APP_DIR: &str = "teammy";
const CONFIG_FILE: &str = "config.toml";

/// `<config_dir>/teammy/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
        .ok_or_else(|| ConfigError::ParseError("no config directory on this platform".into()))
}

/// Write the commented default template to `path`.
///
/// An existing file is left untouched.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_err = |action: &str, target: &Path, e: io::Error| {
        ConfigError::ParseError(format!("{action} {}: {e}", target.display()))
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err("cannot create", dir, e))?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(()),
        Err(e) => return Err(io_err("cannot create", path, e)),
    };
    file.write_all(default_config_toml().as_bytes())
        .map_err(|e| io_err("cannot write", path, e))?;

    info!(path = %path.display(), "Wrote default config");
    Ok(())
}
