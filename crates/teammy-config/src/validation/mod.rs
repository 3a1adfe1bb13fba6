//! Full configuration validation.
//!
//! Validates numeric ranges, URLs, and cross-field constraints, collecting
//! every violation into a single `ConfigError`.

mod helpers;
mod realtime;

#[cfg(test)]
mod tests;

use crate::schema::TeammyConfig;
use teammy_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TeammyConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    realtime::validate_endpoint(&mut errors, config);
    realtime::validate_timing(&mut errors, config);
    realtime::validate_reconnect(&mut errors, config);
    realtime::validate_auth(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
