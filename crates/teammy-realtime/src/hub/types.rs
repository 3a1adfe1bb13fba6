//! Transport configuration, connection state, and the connection traits.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::watch;

use crate::auth::TokenProvider;
use crate::error::RealtimeError;

// ---------------------------------------------------------------------------
// Connection State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Streaming transport kinds a hub may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    WebSockets,
    ServerSentEvents,
    LongPolling,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::WebSockets => "WebSockets",
            TransportKind::ServerSentEvents => "ServerSentEvents",
            TransportKind::LongPolling => "LongPolling",
        };
        f.write_str(name)
    }
}

/// Exponential backoff for automatic reconnects.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Scale each delay by a random factor in `[0.8, 1.2]`.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt `attempt` (zero-based), or `None` to
    /// give up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        if !self.jitter {
            return Some(delay);
        }
        let scale = rand::thread_rng().gen_range(0.8..=1.2);
        Some(delay.mul_f64(scale).min(self.max_delay))
    }
}

/// Everything a connector needs to build a hub connection.
#[derive(Clone)]
pub struct HubOptions {
    /// Hub URL (`http(s)` or `ws(s)`).
    pub url: String,
    /// Evaluated on every connection attempt, reconnects included.
    pub token_provider: Arc<dyn TokenProvider>,
    pub transport: TransportKind,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
    pub keepalive_interval: Duration,
    /// Silence longer than this drops the connection.
    pub server_timeout: Duration,
    /// Trace every frame sent and received.
    pub log_frames: bool,
}

impl fmt::Debug for HubOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubOptions")
            .field("url", &self.url)
            .field("token_provider", &"[REDACTED]")
            .field("transport", &self.transport)
            .field("reconnect", &self.reconnect)
            .field("connect_timeout", &self.connect_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("server_timeout", &self.server_timeout)
            .field("log_frames", &self.log_frames)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Low-level handler for one inbound hub method.
pub type InboundHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// A connection to a hub.
///
/// Method names are matched case-insensitively. Registering a handler for a
/// name that already has one replaces it.
#[async_trait]
pub trait HubConnection: Send + Sync {
    fn on(&self, target: &str, handler: InboundHandler);

    fn off(&self, target: &str);

    /// Open the connection. Calling it on a started connection is a no-op.
    async fn start(&self) -> Result<(), RealtimeError>;

    /// Close the connection. Calling it on a stopped connection is a no-op.
    async fn stop(&self) -> Result<(), RealtimeError>;

    /// Invoke a hub method and wait for its completion.
    async fn invoke(
        &self,
        target: &str,
        arguments: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, RealtimeError>;

    /// Queue a hub method call that expects no completion.
    ///
    /// Returns once the call is queued; calls queued from one task go out in
    /// order.
    async fn send(
        &self,
        target: &str,
        arguments: Vec<serde_json::Value>,
    ) -> Result<(), RealtimeError>;

    fn state(&self) -> ConnectionState;

    fn state_changes(&self) -> watch::Receiver<ConnectionState>;
}

/// Builds hub connections. Building performs no I/O.
pub trait HubConnector: Send + Sync {
    fn build(&self, options: HubOptions) -> Arc<dyn HubConnection>;
}
