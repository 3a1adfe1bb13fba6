//! Configuration schema types for Teammy.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with defaults matching the hosted deployment.

mod auth;
mod realtime;
mod system;

pub use auth::*;
pub use realtime::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct TeammyConfig {
    pub realtime: RealtimeConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}
