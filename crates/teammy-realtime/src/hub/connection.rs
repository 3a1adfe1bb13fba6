//! Background hub connection task with keep-alive and automatic reconnect.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout, Duration, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::handler::{fail_pending, handle_hub_message, Flow, HandlerMap, PendingInvocations};
use super::protocol::{
    handshake_request, parse_frame, parse_handshake_response, HubMessage, RECORD_SEPARATOR,
};
use super::types::{ConnectionState, HubOptions};
use crate::endpoint::websocket_url;
use crate::error::RealtimeError;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Invocation Ids
// ---------------------------------------------------------------------------

static INVOCATION_COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_invocation_id() -> String {
    INVOCATION_COUNTER.fetch_add(1, Ordering::Relaxed).to_string()
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands sent from the connection handle to the background task.
#[derive(Debug)]
pub(crate) enum HubCommand {
    Invoke {
        target: String,
        arguments: Vec<Value>,
        reply: oneshot::Sender<Result<Value, RealtimeError>>,
    },
    /// Invocation without an id; the hub sends no completion.
    Send {
        target: String,
        arguments: Vec<Value>,
    },
    Stop,
}

pub(crate) struct LoopContext {
    pub(crate) options: HubOptions,
    pub(crate) handlers: HandlerMap,
    pub(crate) state_tx: watch::Sender<ConnectionState>,
}

// ---------------------------------------------------------------------------
// Opening
// ---------------------------------------------------------------------------

/// A handshaken socket plus records that arrived with the handshake response.
pub(crate) struct OpenSocket {
    pub(crate) stream: WsStream,
    pub(crate) backlog: Vec<HubMessage>,
}

/// Connect and perform the protocol handshake, both under the connect timeout.
pub(crate) async fn open_socket(options: &HubOptions) -> Result<OpenSocket, RealtimeError> {
    let token = options.token_provider.access_token();
    let url = websocket_url(&options.url, &token)?;
    info!(url = %options.url, authenticated = !token.is_empty(), "Connecting to hub");

    let (mut stream, _) = match timeout(options.connect_timeout, tokio_tungstenite::connect_async(url.as_str())).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => return Err(RealtimeError::Connect(e.to_string())),
        Err(_elapsed) => return Err(RealtimeError::Timeout(options.connect_timeout)),
    };

    stream
        .send(WsMessage::Text(handshake_request().into()))
        .await
        .map_err(|e| RealtimeError::Handshake(e.to_string()))?;

    let backlog = timeout(options.connect_timeout, read_handshake(&mut stream))
        .await
        .map_err(|_elapsed| RealtimeError::Timeout(options.connect_timeout))??;

    Ok(OpenSocket { stream, backlog })
}

async fn read_handshake(stream: &mut WsStream) -> Result<Vec<HubMessage>, RealtimeError> {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                let rest = parse_handshake_response(&text)?;
                let backlog = rest
                    .into_iter()
                    .filter_map(|record| match HubMessage::parse(record) {
                        Ok(message) => Some(message),
                        Err(e) => {
                            debug!(error = %e, "Unrecognized record after handshake");
                            None
                        }
                    })
                    .collect();
                return Ok(backlog);
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => return Err(RealtimeError::Handshake(e.to_string())),
        }
    }
    Err(RealtimeError::Handshake(
        "connection closed during handshake".into(),
    ))
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

enum SocketExit {
    /// Stop requested or the handle was dropped.
    Stopped,
    /// The hub closed the connection and did not allow a reconnect.
    Closed { error: Option<String> },
    /// Unexpected loss; eligible for reconnect.
    Lost(String),
}

enum Reconnect {
    Connected(OpenSocket),
    Stopped,
    GaveUp,
}

/// Background task owning the socket for the lifetime of a started
/// connection, reconnects included.
pub(crate) async fn connection_loop(
    ctx: LoopContext,
    socket: OpenSocket,
    mut command_rx: mpsc::Receiver<HubCommand>,
) {
    let mut pending = PendingInvocations::new();
    let mut socket = socket;

    loop {
        let exit = drive_socket(&ctx, socket, &mut command_rx, &mut pending).await;
        fail_pending(&mut pending);

        let reason = match exit {
            SocketExit::Stopped => {
                info!("Hub connection stopped");
                break;
            }
            SocketExit::Closed { error } => {
                match error {
                    Some(e) => warn!(error = %e, "Hub closed the connection without reconnect"),
                    None => info!("Hub closed the connection"),
                }
                break;
            }
            SocketExit::Lost(reason) => reason,
        };

        if !ctx.options.reconnect.enabled {
            warn!(reason = %reason, "Hub connection lost");
            break;
        }

        warn!(reason = %reason, "Hub connection lost, reconnecting");
        ctx.state_tx.send_replace(ConnectionState::Reconnecting);

        match reconnect(&ctx, &mut command_rx).await {
            Reconnect::Connected(next) => {
                info!("Hub connection re-established");
                ctx.state_tx.send_replace(ConnectionState::Connected);
                socket = next;
            }
            Reconnect::Stopped => {
                info!("Hub connection stopped while reconnecting");
                break;
            }
            Reconnect::GaveUp => {
                error!("Giving up on hub reconnect");
                break;
            }
        }
    }

    ctx.state_tx.send_replace(ConnectionState::Disconnected);
}

fn exit_for_close(error: Option<String>, allow_reconnect: bool) -> SocketExit {
    if allow_reconnect {
        SocketExit::Lost(error.unwrap_or_else(|| "hub requested reconnect".into()))
    } else {
        SocketExit::Closed { error }
    }
}

async fn drive_socket(
    ctx: &LoopContext,
    socket: OpenSocket,
    command_rx: &mut mpsc::Receiver<HubCommand>,
    pending: &mut PendingInvocations,
) -> SocketExit {
    let OpenSocket { stream, backlog } = socket;
    let (mut sink, mut stream) = stream.split();
    let log_frames = ctx.options.log_frames;

    for message in backlog {
        if let Flow::Closed {
            error,
            allow_reconnect,
        } = handle_hub_message(message, &ctx.handlers, pending)
        {
            return exit_for_close(error, allow_reconnect);
        }
    }

    let keepalive_every = ctx.options.keepalive_interval.max(Duration::from_millis(10));
    let mut keepalive = tokio::time::interval_at(Instant::now() + keepalive_every, keepalive_every);
    let mut last_received = Instant::now();

    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(HubCommand::Invoke { target, arguments, reply }) => {
                    let invocation_id = next_invocation_id();
                    let message = HubMessage::Invocation {
                        invocation_id: Some(invocation_id.clone()),
                        target,
                        arguments,
                    };
                    let record = match message.encode() {
                        Ok(record) => record,
                        Err(e) => {
                            let _ = reply.send(Err(e));
                            continue;
                        }
                    };
                    if log_frames {
                        trace!(frame = %record.trim_end_matches(RECORD_SEPARATOR), "Hub frame out");
                    }
                    if let Err(e) = sink.send(WsMessage::Text(record.into())).await {
                        let _ = reply.send(Err(RealtimeError::NotConnected));
                        return SocketExit::Lost(format!("send failed: {e}"));
                    }
                    pending.insert(invocation_id, reply);
                }
                Some(HubCommand::Send { target, arguments }) => {
                    let message = HubMessage::Invocation {
                        invocation_id: None,
                        target,
                        arguments,
                    };
                    let record = match message.encode() {
                        Ok(record) => record,
                        Err(e) => {
                            warn!(error = %e, "Dropping unencodable hub call");
                            continue;
                        }
                    };
                    if log_frames {
                        trace!(frame = %record.trim_end_matches(RECORD_SEPARATOR), "Hub frame out");
                    }
                    if let Err(e) = sink.send(WsMessage::Text(record.into())).await {
                        return SocketExit::Lost(format!("send failed: {e}"));
                    }
                }
                Some(HubCommand::Stop) | None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return SocketExit::Stopped;
                }
            },
            _ = keepalive.tick() => {
                if last_received.elapsed() > ctx.options.server_timeout {
                    return SocketExit::Lost(format!(
                        "no message from hub within {:?}",
                        ctx.options.server_timeout
                    ));
                }
                if let Ok(record) = HubMessage::Ping.encode() {
                    if sink.send(WsMessage::Text(record.into())).await.is_err() {
                        return SocketExit::Lost("keep-alive send failed".into());
                    }
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    last_received = Instant::now();
                    if log_frames {
                        trace!(frame = %text.as_str(), "Hub frame in");
                    }
                    for parsed in parse_frame(&text) {
                        match parsed {
                            Ok(message) => {
                                if let Flow::Closed { error, allow_reconnect } =
                                    handle_hub_message(message, &ctx.handlers, pending)
                                {
                                    return exit_for_close(error, allow_reconnect);
                                }
                            }
                            Err(e) => debug!(error = %e, "Unrecognized hub record"),
                        }
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    return SocketExit::Lost("socket closed".into());
                }
                Some(Ok(_)) => {
                    last_received = Instant::now();
                }
                Some(Err(e)) => return SocketExit::Lost(e.to_string()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Reconnect
// ---------------------------------------------------------------------------

async fn reconnect(ctx: &LoopContext, command_rx: &mut mpsc::Receiver<HubCommand>) -> Reconnect {
    let mut attempt = 0;
    while let Some(delay) = ctx.options.reconnect.delay_for(attempt) {
        attempt += 1;
        info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to hub"
        );
        if wait_or_stop(delay, command_rx).await {
            return Reconnect::Stopped;
        }
        match open_socket(&ctx.options).await {
            Ok(socket) => return Reconnect::Connected(socket),
            Err(e) => error!(attempt, error = %e, "Hub reconnect attempt failed"),
        }
    }
    Reconnect::GaveUp
}

/// Sleep for `delay`, refusing invocations meanwhile. Returns `true` when a
/// stop arrives first.
async fn wait_or_stop(delay: Duration, command_rx: &mut mpsc::Receiver<HubCommand>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            command = command_rx.recv() => match command {
                Some(HubCommand::Invoke { reply, .. }) => {
                    let _ = reply.send(Err(RealtimeError::NotConnected));
                }
                Some(HubCommand::Send { target, .. }) => {
                    debug!(target = %target, "Dropping hub call while reconnecting");
                }
                Some(HubCommand::Stop) | None => return true,
            },
        }
    }
}
