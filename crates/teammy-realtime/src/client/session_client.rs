//! The realtime session client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use super::session::SessionState;
use crate::auth::TokenProvider;
use crate::dispatcher::{Listener, ListenerRegistry, Unsubscribe};
use crate::endpoint::{hub_url, DEFAULT_HUB_PATH};
use crate::error::RealtimeError;
use crate::events::{methods, EventName};
use crate::hub::{
    ConnectionState, HubConnection, HubConnector, HubOptions, ReconnectPolicy, TransportKind,
    WsHubConnector,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for a [`RealtimeSessionClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeClientConfig {
    /// REST API base URL; a trailing `/api` is stripped for the hub.
    pub api_base_url: String,
    pub hub_path: String,
    pub connect_timeout: Duration,
    pub keepalive_interval: Duration,
    pub server_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub log_frames: bool,
}

impl Default for RealtimeClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".into(),
            hub_path: DEFAULT_HUB_PATH.into(),
            connect_timeout: Duration::from_secs(15),
            keepalive_interval: Duration::from_secs(15),
            server_timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            log_frames: false,
        }
    }
}

impl RealtimeClientConfig {
    pub fn hub_url(&self) -> String {
        hub_url(&self.api_base_url, &self.hub_path)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// One multiplexed hub connection, its listeners, and the single active
/// chat session.
///
/// Construct one per application and share it behind an `Arc`. All remote
/// session operations are best effort: failures are logged and swallowed,
/// only connection start errors reach the caller.
pub struct RealtimeSessionClient {
    config: RealtimeClientConfig,
    token_provider: Arc<dyn TokenProvider>,
    connector: Arc<dyn HubConnector>,
    listeners: Arc<ListenerRegistry>,
    connection: Mutex<Option<Arc<dyn HubConnection>>>,
    started: AtomicBool,
    /// Serializes `start` and `stop` so only one transport is created.
    start_lock: AsyncMutex<()>,
    session: Mutex<SessionState>,
    /// Held for the whole leave-then-join sequence of `join_session`.
    switch_lock: AsyncMutex<()>,
}

impl RealtimeSessionClient {
    pub fn new(config: RealtimeClientConfig, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self::with_connector(config, token_provider, Arc::new(WsHubConnector))
    }

    /// Use `connector` to build the transport instead of the WebSocket one.
    pub fn with_connector(
        config: RealtimeClientConfig,
        token_provider: Arc<dyn TokenProvider>,
        connector: Arc<dyn HubConnector>,
    ) -> Self {
        Self {
            config,
            token_provider,
            connector,
            listeners: ListenerRegistry::new(),
            connection: Mutex::new(None),
            started: AtomicBool::new(false),
            start_lock: AsyncMutex::new(()),
            session: Mutex::new(SessionState::Idle),
            switch_lock: AsyncMutex::new(()),
        }
    }

    pub fn config(&self) -> &RealtimeClientConfig {
        &self.config
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Start the hub connection, or return it if already started.
    ///
    /// Concurrent callers share one transport and receive the same `Arc`.
    pub async fn start(&self) -> Result<Arc<dyn HubConnection>, RealtimeError> {
        if let Some(connection) = self.started_connection() {
            return Ok(connection);
        }

        let _guard = self.start_lock.lock().await;
        if let Some(connection) = self.started_connection() {
            return Ok(connection);
        }

        let connection = self.connection_or_build();
        self.register_handlers(connection.as_ref());

        if let Err(e) = connection.start().await {
            warn!(error = %e, "Realtime connection failed to start");
            return Err(e);
        }

        self.started.store(true, Ordering::SeqCst);
        info!(url = %self.config.hub_url(), "Realtime client started");
        Ok(connection)
    }

    /// Stop and discard the hub connection. Does nothing when none was
    /// built.
    pub async fn stop(&self) {
        let _guard = self.start_lock.lock().await;
        self.started.store(false, Ordering::SeqCst);

        let Some(connection) = self.lock_connection().take() else {
            return;
        };
        if let Err(e) = connection.stop().await {
            warn!(error = %e, "Failed to stop realtime connection");
        }
        info!("Realtime client stopped");
    }

    /// Whether a started connection is still live. A transport that shut
    /// itself down (hub close, reconnect given up) no longer counts.
    pub fn is_started(&self) -> bool {
        self.started_connection().is_some()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.current_connection()
            .map_or(ConnectionState::Disconnected, |c| c.state())
    }

    /// Transport state updates, or `None` before the first `start`.
    pub fn state_changes(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.current_connection().map(|c| c.state_changes())
    }

    fn started_connection(&self) -> Option<Arc<dyn HubConnection>> {
        if !self.started.load(Ordering::SeqCst) {
            return None;
        }
        let connection = self.current_connection()?;
        if connection.state() == ConnectionState::Disconnected {
            if self.started.swap(false, Ordering::SeqCst) {
                info!("Realtime connection closed by transport, will restart on demand");
            }
            return None;
        }
        Some(connection)
    }

    fn current_connection(&self) -> Option<Arc<dyn HubConnection>> {
        self.lock_connection().clone()
    }

    fn connection_or_build(&self) -> Arc<dyn HubConnection> {
        let mut slot = self.lock_connection();
        if let Some(connection) = slot.as_ref() {
            return Arc::clone(connection);
        }

        let options = HubOptions {
            url: self.config.hub_url(),
            token_provider: Arc::clone(&self.token_provider),
            transport: TransportKind::WebSockets,
            reconnect: self.config.reconnect.clone(),
            connect_timeout: self.config.connect_timeout,
            keepalive_interval: self.config.keepalive_interval,
            server_timeout: self.config.server_timeout,
            log_frames: self.config.log_frames,
        };
        debug!(?options, "Building hub connection");
        let connection = self.connector.build(options);
        *slot = Some(Arc::clone(&connection));
        connection
    }

    /// Route every known event from the transport into the registry.
    fn register_handlers(&self, connection: &dyn HubConnection) {
        for event in EventName::ALL {
            connection.off(event.as_str());
            let registry = Arc::clone(&self.listeners);
            connection.on(
                event.as_str(),
                Arc::new(move |payload: Value| {
                    registry.dispatch(event, &payload);
                }),
            );
        }
    }

    // -- Listeners ----------------------------------------------------------

    /// Subscribe to an event by wire name. Unknown names register nothing
    /// and return a no-op handle.
    pub fn on<F>(&self, event_name: &str, callback: F) -> Unsubscribe
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        match event_name.parse::<EventName>() {
            Ok(event) => self.on_event(event, callback),
            Err(e) => {
                debug!(error = %e, "Ignoring listener for unknown event");
                Unsubscribe::noop()
            }
        }
    }

    pub fn on_event<F>(&self, event: EventName, callback: F) -> Unsubscribe
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(event, Arc::new(callback))
    }

    /// Subscribe a shared listener; the same `Arc` is registered at most
    /// once per event.
    pub fn subscribe(&self, event: EventName, listener: Listener) -> Unsubscribe {
        self.listeners.subscribe(event, listener)
    }

    // -- Session membership -------------------------------------------------

    pub fn current_session_id(&self) -> Option<String> {
        self.lock_session().session_id().map(str::to_string)
    }

    pub fn session_state(&self) -> SessionState {
        self.lock_session().clone()
    }

    /// Join `session_id`, leaving any other tracked session first.
    ///
    /// Starts the connection if needed and propagates a start failure. The
    /// remote join itself is optimistic: its failure is logged and the
    /// session is still recorded as joined.
    pub async fn join_session(&self, session_id: &str) -> Result<(), RealtimeError> {
        if session_id.is_empty() {
            return Ok(());
        }

        let connection = self.start().await?;
        let _switch = self.switch_lock.lock().await;

        let previous = self.current_session_id();
        if let Some(previous) = previous.filter(|previous| previous != session_id) {
            info!(from = %previous, to = %session_id, "Switching session");
            self.leave_session(&previous).await;
        }

        *self.lock_session() = SessionState::Joining(session_id.to_string());
        info!(session_id = %session_id, "Joining session");

        if let Err(e) = connection
            .invoke(methods::JOIN_SESSION, vec![json!(session_id)])
            .await
        {
            warn!(session_id = %session_id, error = %e, "JoinSession failed");
        }

        let mut session = self.lock_session();
        if *session == SessionState::Joining(session_id.to_string()) {
            *session = SessionState::Joined(session_id.to_string());
        }
        Ok(())
    }

    /// Leave `session_id`.
    ///
    /// The tracked session is cleared only if it is still `session_id` when
    /// the remote call settles, so a late leave never clobbers a newer join.
    pub async fn leave_session(&self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }
        let Some(connection) = self.current_connection() else {
            debug!(session_id = %session_id, "Leave skipped, no connection");
            return;
        };

        {
            let mut session = self.lock_session();
            if session.session_id() == Some(session_id) {
                *session = SessionState::Leaving(session_id.to_string());
            }
        }
        info!(session_id = %session_id, "Leaving session");

        if let Err(e) = connection
            .invoke(methods::LEAVE_SESSION, vec![json!(session_id)])
            .await
        {
            warn!(session_id = %session_id, error = %e, "LeaveSession failed");
        }

        let mut session = self.lock_session();
        if session.session_id() == Some(session_id) {
            *session = SessionState::Idle;
        } else {
            debug!(session_id = %session_id, "Session changed while leaving");
        }
    }

    /// Broadcast the local typing indicator for `session_id`.
    ///
    /// Fire and forget: returns once the call is queued, without waiting for
    /// the hub.
    pub async fn typing_session(&self, session_id: &str, is_typing: bool) {
        if session_id.is_empty() {
            return;
        }
        let Some(connection) = self.current_connection() else {
            return;
        };

        if let Err(e) = connection
            .send(
                methods::TYPING_SESSION,
                vec![json!(session_id), json!(is_typing)],
            )
            .await
        {
            warn!(session_id = %session_id, is_typing, error = %e, "TypingSession failed");
        }
    }

    // -- Locks --------------------------------------------------------------

    fn lock_connection(&self) -> MutexGuard<'_, Option<Arc<dyn HubConnection>>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
