//! Incoming hub message handling.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::protocol::{payload_from_arguments, HubMessage};
use super::types::InboundHandler;
use crate::error::RealtimeError;

/// Inbound handlers keyed by lower-cased method name.
pub(crate) type HandlerMap = Arc<RwLock<HashMap<String, InboundHandler>>>;

/// Invocations awaiting a completion, keyed by invocation id.
pub(crate) type PendingInvocations =
    HashMap<String, oneshot::Sender<Result<Value, RealtimeError>>>;

/// What the connection task should do after a message.
#[derive(Debug, PartialEq)]
pub(crate) enum Flow {
    Continue,
    Closed {
        error: Option<String>,
        allow_reconnect: bool,
    },
}

pub(crate) fn handler_key(target: &str) -> String {
    target.to_ascii_lowercase()
}

/// Handle a single incoming hub message.
pub(crate) fn handle_hub_message(
    message: HubMessage,
    handlers: &HandlerMap,
    pending: &mut PendingInvocations,
) -> Flow {
    match message {
        HubMessage::Invocation {
            target, arguments, ..
        } => {
            let handler = handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&handler_key(&target))
                .cloned();
            match handler {
                Some(handler) => handler(payload_from_arguments(arguments)),
                None => debug!(method = %target, "No handler for hub method"),
            }
            Flow::Continue
        }
        HubMessage::Completion {
            invocation_id,
            result,
            error,
        } => {
            match pending.remove(&invocation_id) {
                Some(reply) => {
                    let outcome = match error {
                        Some(error) => Err(RealtimeError::Hub(error)),
                        None => Ok(result.unwrap_or(Value::Null)),
                    };
                    let _ = reply.send(outcome);
                }
                None => debug!(invocation_id = %invocation_id, "Completion for unknown invocation"),
            }
            Flow::Continue
        }
        HubMessage::Ping => Flow::Continue,
        HubMessage::Close {
            error,
            allow_reconnect,
        } => {
            match &error {
                Some(e) => warn!(error = %e, allow_reconnect, "Hub closed the connection"),
                None => debug!(allow_reconnect, "Hub closed the connection"),
            }
            Flow::Closed {
                error,
                allow_reconnect,
            }
        }
        HubMessage::Other(kind) => {
            debug!(kind, "Ignoring unsupported hub message");
            Flow::Continue
        }
    }
}

/// Fail every pending invocation.
pub(crate) fn fail_pending(pending: &mut PendingInvocations) {
    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(RealtimeError::NotConnected));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn handlers_with(target: &str, seen: Arc<Mutex<Vec<Value>>>) -> HandlerMap {
        let mut map = HashMap::new();
        let handler: InboundHandler = Arc::new(move |payload| seen.lock().unwrap().push(payload));
        map.insert(handler_key(target), handler);
        Arc::new(RwLock::new(map))
    }

    #[test]
    fn invocation_reaches_handler_case_insensitively() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handlers = handlers_with("ReceiveSessionMessage", Arc::clone(&seen));
        let mut pending = PendingInvocations::new();

        let flow = handle_hub_message(
            HubMessage::Invocation {
                invocation_id: None,
                target: "receivesessionmessage".into(),
                arguments: vec![json!({"content": "hi"})],
            },
            &handlers,
            &mut pending,
        );

        assert_eq!(flow, Flow::Continue);
        assert_eq!(*seen.lock().unwrap(), vec![json!({"content": "hi"})]);
    }

    #[test]
    fn completion_resolves_pending_invocation() {
        let handlers: HandlerMap = Arc::default();
        let mut pending = PendingInvocations::new();
        let (tx, mut rx) = oneshot::channel();
        pending.insert("4".into(), tx);

        handle_hub_message(
            HubMessage::Completion {
                invocation_id: "4".into(),
                result: None,
                error: Some("Session not found".into()),
            },
            &handlers,
            &mut pending,
        );

        assert!(pending.is_empty());
        assert!(matches!(rx.try_recv(), Ok(Err(RealtimeError::Hub(_)))));
    }

    #[test]
    fn close_ends_the_flow() {
        let handlers: HandlerMap = Arc::default();
        let mut pending = PendingInvocations::new();
        let flow = handle_hub_message(
            HubMessage::Close {
                error: None,
                allow_reconnect: false,
            },
            &handlers,
            &mut pending,
        );
        assert_eq!(
            flow,
            Flow::Closed {
                error: None,
                allow_reconnect: false
            }
        );
    }

    #[test]
    fn fail_pending_reports_not_connected() {
        let mut pending = PendingInvocations::new();
        let (tx, mut rx) = oneshot::channel();
        pending.insert("1".into(), tx);
        fail_pending(&mut pending);
        assert!(matches!(rx.try_recv(), Ok(Err(RealtimeError::NotConnected))));
    }
}
