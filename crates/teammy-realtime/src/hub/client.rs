//! WebSocket implementation of [`HubConnection`].

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::connection::{connection_loop, open_socket, HubCommand, LoopContext};
use super::handler::{handler_key, HandlerMap};
use super::types::{
    ConnectionState, HubConnection, HubConnector, HubOptions, InboundHandler, TransportKind,
};
use crate::error::RealtimeError;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

struct Running {
    command_tx: mpsc::Sender<HubCommand>,
    task: JoinHandle<()>,
}

/// Hub connection over a WebSocket.
///
/// `start` performs the connect and handshake inline so failures reach the
/// caller; afterwards a background task owns the socket, answers
/// invocations and reconnects per the configured policy.
pub struct WsHubConnection {
    options: HubOptions,
    handlers: HandlerMap,
    state_tx: watch::Sender<ConnectionState>,
    running: Mutex<Option<Running>>,
}

impl WsHubConnection {
    pub fn new(options: HubOptions) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            options,
            handlers: Arc::new(RwLock::new(Default::default())),
            state_tx,
            running: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &HubOptions {
        &self.options
    }

    async fn command_tx(&self) -> Result<mpsc::Sender<HubCommand>, RealtimeError> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|r| r.command_tx.clone())
            .ok_or(RealtimeError::NotConnected)
    }
}

impl Running {
    /// The loop reports `Disconnected` just before its task exits, so a task
    /// in that state is finishing even if it has not yet been reaped.
    fn is_live(&self, state: ConnectionState) -> bool {
        !self.task.is_finished() && state != ConnectionState::Disconnected
    }
}

#[async_trait]
impl HubConnection for WsHubConnection {
    fn on(&self, target: &str, handler: InboundHandler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handler_key(target), handler);
    }

    fn off(&self, target: &str) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handler_key(target));
    }

    async fn start(&self) -> Result<(), RealtimeError> {
        let mut running = self.running.lock().await;
        // A finished task (server close, reconnect exhausted) may be restarted.
        if running.as_ref().is_some_and(|r| r.is_live(self.state())) {
            return Ok(());
        }

        if self.options.transport != TransportKind::WebSockets {
            return Err(RealtimeError::UnsupportedTransport(
                self.options.transport.to_string(),
            ));
        }

        self.state_tx.send_replace(ConnectionState::Connecting);
        let socket = match open_socket(&self.options).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!(error = %e, "Hub connection failed");
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        let (command_tx, command_rx) = mpsc::channel(64);
        self.state_tx.send_replace(ConnectionState::Connected);
        let ctx = LoopContext {
            options: self.options.clone(),
            handlers: Arc::clone(&self.handlers),
            state_tx: self.state_tx.clone(),
        };
        let task = tokio::spawn(connection_loop(ctx, socket, command_rx));
        *running = Some(Running { command_tx, task });

        info!(url = %self.options.url, "Hub connection started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), RealtimeError> {
        let Some(Running {
            command_tx,
            mut task,
        }) = self.running.lock().await.take()
        else {
            return Ok(());
        };

        let _ = command_tx.send(HubCommand::Stop).await;
        drop(command_tx);

        let result = match tokio::time::timeout(self.options.connect_timeout, &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RealtimeError::Connect(format!(
                "connection task failed: {e}"
            ))),
            Err(_elapsed) => {
                task.abort();
                Err(RealtimeError::Timeout(self.options.connect_timeout))
            }
        };
        self.state_tx.send_replace(ConnectionState::Disconnected);
        result
    }

    async fn invoke(&self, target: &str, arguments: Vec<Value>) -> Result<Value, RealtimeError> {
        let command_tx = self.command_tx().await?;
        let (reply_tx, reply_rx) = oneshot::channel();
        command_tx
            .send(HubCommand::Invoke {
                target: target.to_string(),
                arguments,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RealtimeError::NotConnected)?;

        reply_rx.await.map_err(|_| RealtimeError::NotConnected)?
    }

    async fn send(&self, target: &str, arguments: Vec<Value>) -> Result<(), RealtimeError> {
        self.command_tx()
            .await?
            .send(HubCommand::Send {
                target: target.to_string(),
                arguments,
            })
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Builds [`WsHubConnection`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsHubConnector;

impl HubConnector for WsHubConnector {
    fn build(&self, options: HubOptions) -> Arc<dyn HubConnection> {
        Arc::new(WsHubConnection::new(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::protocol::{split_records, RECORD_SEPARATOR};
    use crate::hub::ReconnectPolicy;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    type ServerSocket = WebSocketStream<TcpStream>;

    fn options(url: String, reconnect: ReconnectPolicy) -> HubOptions {
        HubOptions {
            url,
            token_provider: Arc::new(|| "tok-1".to_string()),
            transport: TransportKind::WebSockets,
            reconnect,
            connect_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(30),
            server_timeout: Duration::from_secs(60),
            log_frames: true,
        }
    }

    fn fast_reconnect() -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: true,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            max_attempts: Some(20),
            jitter: false,
        }
    }

    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/groupChatHub", listener.local_addr().unwrap());
        (listener, url)
    }

    /// Accept one client, answer the handshake, and return the socket plus
    /// the request URI the client used.
    async fn accept_hub(listener: &TcpListener) -> (ServerSocket, String) {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut uri = String::new();
        let mut ws = tokio_tungstenite::accept_hdr_async(tcp, |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            uri = req.uri().to_string();
            Ok(resp)
        })
        .await
        .unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        let text = frame.into_text().unwrap();
        assert!(text.contains(r#""protocol":"json""#));
        ws.send(Message::Text(format!("{{}}{RECORD_SEPARATOR}").into()))
            .await
            .unwrap();
        (ws, uri)
    }

    /// Next record from the client that is not a ping.
    async fn next_record(ws: &mut ServerSocket) -> Value {
        loop {
            let frame = ws.next().await.unwrap().unwrap();
            if let Message::Text(text) = frame {
                for record in split_records(&text) {
                    let value: Value = serde_json::from_str(record).unwrap();
                    if value["type"] != 6 {
                        return value;
                    }
                }
            }
        }
    }

    async fn send_record(ws: &mut ServerSocket, value: Value) {
        ws.send(Message::Text(format!("{value}{RECORD_SEPARATOR}").into()))
            .await
            .unwrap();
    }

    async fn wait_for_state(conn: &WsHubConnection, wanted: ConnectionState) {
        let mut rx = conn.state_changes();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == wanted))
            .await
            .expect("state change timed out")
            .unwrap();
    }

    #[tokio::test]
    async fn invoke_before_start_is_not_connected() {
        let conn = WsHubConnection::new(options("http://localhost:1/hub".into(), ReconnectPolicy::disabled()));
        let err = conn.invoke("JoinSession", vec![json!("s1")]).await.unwrap_err();
        assert!(matches!(err, RealtimeError::NotConnected));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn non_websocket_transport_is_rejected() {
        let mut opts = options("http://localhost:1/hub".into(), ReconnectPolicy::disabled());
        opts.transport = TransportKind::LongPolling;
        let conn = WsHubConnection::new(opts);
        let err = conn.start().await.unwrap_err();
        assert!(matches!(err, RealtimeError::UnsupportedTransport(_)));
    }

    #[tokio::test]
    async fn refused_connection_fails_start() {
        let (listener, url) = bind().await;
        drop(listener);
        let conn = WsHubConnection::new(options(url, ReconnectPolicy::disabled()));
        assert!(conn.start().await.is_err());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn handshake_error_fails_start() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let _ = ws.next().await;
            send_record(&mut ws, json!({"error": "Requested protocol 'json' is not available."})).await;
            // Hold the socket open until the client gives up.
            let _ = ws.next().await;
        });

        let conn = WsHubConnection::new(options(url, ReconnectPolicy::disabled()));
        let err = conn.start().await.unwrap_err();
        assert!(matches!(err, RealtimeError::Handshake(_)));
        server.abort();
    }

    #[tokio::test]
    async fn invokes_receives_and_stops() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let (mut ws, uri) = accept_hub(&listener).await;
            assert!(uri.contains("access_token=tok-1"), "uri was {uri}");

            let invocation = next_record(&mut ws).await;
            assert_eq!(invocation["type"], 1);
            assert_eq!(invocation["target"], "JoinSession");
            assert_eq!(invocation["arguments"], json!(["s1"]));
            let id = invocation["invocationId"].clone();
            send_record(&mut ws, json!({"type": 3, "invocationId": id, "result": true})).await;

            send_record(
                &mut ws,
                json!({"type": 1, "target": "ReceiveSessionMessage", "arguments": [{"content": "hi"}]}),
            )
            .await;

            // Drain until the client closes.
            while let Some(Ok(frame)) = ws.next().await {
                if frame.is_close() {
                    break;
                }
            }
        });

        let conn = WsHubConnection::new(options(url, ReconnectPolicy::disabled()));
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        conn.on(
            "receivesessionmessage",
            Arc::new(move |payload: Value| {
                let _ = seen_tx.send(payload);
            }),
        );

        conn.start().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
        // Second start is a no-op.
        conn.start().await.unwrap();

        let result = conn.invoke("JoinSession", vec![json!("s1")]).await.unwrap();
        assert_eq!(result, json!(true));

        let payload = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload, json!({"content": "hi"}));

        conn.stop().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(matches!(
            conn.invoke("LeaveSession", vec![json!("s1")]).await,
            Err(RealtimeError::NotConnected)
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn hub_error_completion_fails_invoke() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let (mut ws, _) = accept_hub(&listener).await;
            let invocation = next_record(&mut ws).await;
            let id = invocation["invocationId"].clone();
            send_record(&mut ws, json!({"type": 3, "invocationId": id, "error": "Session not found"})).await;
            while let Some(Ok(frame)) = ws.next().await {
                if frame.is_close() {
                    break;
                }
            }
        });

        let conn = WsHubConnection::new(options(url, ReconnectPolicy::disabled()));
        conn.start().await.unwrap();
        let err = conn.invoke("JoinSession", vec![json!("nope")]).await.unwrap_err();
        assert!(matches!(err, RealtimeError::Hub(ref m) if m == "Session not found"));
        conn.stop().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn reconnects_after_the_socket_drops() {
        let (listener, url) = bind().await;
        let (reconnected_tx, reconnected_rx) = oneshot::channel();
        let server = tokio::spawn(async move {
            let (first, _) = accept_hub(&listener).await;
            drop(first);
            let (mut second, uri) = accept_hub(&listener).await;
            let _ = reconnected_tx.send(uri);
            while let Some(Ok(frame)) = second.next().await {
                if frame.is_close() {
                    break;
                }
            }
        });

        let conn = WsHubConnection::new(options(url, fast_reconnect()));
        conn.start().await.unwrap();

        let uri = tokio::time::timeout(Duration::from_secs(5), reconnected_rx)
            .await
            .unwrap()
            .unwrap();
        // The token is fetched again for the new socket.
        assert!(uri.contains("access_token=tok-1"));
        wait_for_state(&conn, ConnectionState::Connected).await;

        conn.stop().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_close_without_reconnect_disconnects() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let (mut ws, _) = accept_hub(&listener).await;
            send_record(&mut ws, json!({"type": 7, "error": "Server shutting down", "allowReconnect": false})).await;
            let _ = ws.next().await;
        });

        let conn = WsHubConnection::new(options(url, fast_reconnect()));
        conn.start().await.unwrap();
        wait_for_state(&conn, ConnectionState::Disconnected).await;
        server.abort();
    }

    #[tokio::test]
    async fn start_after_server_close_opens_a_new_socket() {
        let (listener, url) = bind().await;
        let (reopened_tx, reopened_rx) = oneshot::channel();
        let server = tokio::spawn(async move {
            let (mut first, _) = accept_hub(&listener).await;
            send_record(&mut first, json!({"type": 7, "allowReconnect": false})).await;
            let (mut second, _) = accept_hub(&listener).await;
            let _ = reopened_tx.send(());
            while let Some(Ok(frame)) = second.next().await {
                if frame.is_close() {
                    break;
                }
            }
        });

        let conn = WsHubConnection::new(options(url, ReconnectPolicy::disabled()));
        conn.start().await.unwrap();
        wait_for_state(&conn, ConnectionState::Disconnected).await;

        conn.start().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
        tokio::time::timeout(Duration::from_secs(5), reopened_rx)
            .await
            .unwrap()
            .unwrap();

        conn.stop().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn send_queues_calls_without_invocation_ids() {
        let (listener, url) = bind().await;
        let (records_tx, records_rx) = oneshot::channel();
        let server = tokio::spawn(async move {
            let (mut ws, _) = accept_hub(&listener).await;
            let first = next_record(&mut ws).await;
            let second = next_record(&mut ws).await;
            let _ = records_tx.send((first, second));
            while let Some(Ok(frame)) = ws.next().await {
                if frame.is_close() {
                    break;
                }
            }
        });

        let conn = WsHubConnection::new(options(url, ReconnectPolicy::disabled()));
        conn.start().await.unwrap();
        // Neither call waits for the hub, which never answers them.
        conn.send("TypingSession", vec![json!("s1"), json!(true)]).await.unwrap();
        conn.send("TypingSession", vec![json!("s1"), json!(false)]).await.unwrap();

        let (first, second) = tokio::time::timeout(Duration::from_secs(5), records_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first["type"], 1);
        assert_eq!(first["target"], "TypingSession");
        assert!(first.get("invocationId").is_none());
        assert_eq!(first["arguments"], json!(["s1", true]));
        assert_eq!(second["arguments"], json!(["s1", false]));

        conn.stop().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn send_before_start_is_not_connected() {
        let conn = WsHubConnection::new(options("http://localhost:1/hub".into(), ReconnectPolicy::disabled()));
        let err = conn.send("TypingSession", vec![json!("s1"), json!(true)]).await.unwrap_err();
        assert!(matches!(err, RealtimeError::NotConnected));
    }
}
