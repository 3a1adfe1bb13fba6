//! Realtime hub connection settings.

use serde::{Deserialize, Serialize};

/// Hub endpoint and transport timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// REST base URL; a trailing `/api` is stripped to locate the hub.
    pub api_base_url: String,
    pub hub_path: String,
    /// Valid range: 1-120.
    pub connect_timeout_secs: u32,
    /// Valid range: 1-300.
    pub keepalive_interval_secs: u32,
    /// Must exceed `keepalive_interval_secs`.
    pub server_timeout_secs: u32,
    /// Trace every hub frame. Off by default.
    pub log_frames: bool,
    pub reconnect: ReconnectConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".into(),
            hub_path: "/groupChatHub".into(),
            connect_timeout_secs: 15,
            keepalive_interval_secs: 15,
            server_timeout_secs: 30,
            log_frames: false,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Automatic reconnect backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub base_delay_ms: u32,
    pub max_delay_ms: u32,
    /// 0 means unlimited.
    pub max_attempts: u32,
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 0,
            jitter: true,
        }
    }
}
