//! JSON hub protocol framing.
//!
//! Every record is a JSON object terminated by the ASCII record separator
//! (`0x1E`). A single WebSocket text frame may carry several records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RealtimeError;

pub const RECORD_SEPARATOR: char = '\u{1e}';

const INVOCATION: u8 = 1;
const COMPLETION: u8 = 3;
const PING: u8 = 6;
const CLOSE: u8 = 7;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HandshakeRequest<'a> {
    protocol: &'a str,
    version: u32,
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// The handshake record opening every connection.
pub fn handshake_request() -> String {
    let request = HandshakeRequest {
        protocol: "json",
        version: 1,
    };
    // Serializing a struct of plain fields cannot fail.
    let json = serde_json::to_string(&request).unwrap_or_default();
    format!("{json}{RECORD_SEPARATOR}")
}

/// Parse the handshake response at the start of `text`.
///
/// Returns the records that followed the response in the same frame.
pub fn parse_handshake_response(text: &str) -> Result<Vec<&str>, RealtimeError> {
    let mut records = split_records(text);
    let first = records
        .next()
        .ok_or_else(|| RealtimeError::Handshake("empty handshake response".into()))?;
    let response: HandshakeResponse = serde_json::from_str(first)
        .map_err(|e| RealtimeError::Handshake(format!("malformed response: {e}")))?;
    if let Some(error) = response.error {
        return Err(RealtimeError::Handshake(error));
    }
    Ok(records.collect())
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    Ping,
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// Stream items, cancellations and other types this client ignores.
    Other(u8),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvocationRecord<'a> {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    invocation_id: Option<&'a str>,
    target: &'a str,
    arguments: &'a [Value],
}

impl HubMessage {
    /// Parse one record (without its separator).
    pub fn parse(record: &str) -> Result<Self, RealtimeError> {
        let raw: RawMessage = serde_json::from_str(record)
            .map_err(|e| RealtimeError::Protocol(format!("malformed record: {e}")))?;
        let message = match raw.kind {
            INVOCATION => HubMessage::Invocation {
                invocation_id: raw.invocation_id,
                target: raw
                    .target
                    .ok_or_else(|| RealtimeError::Protocol("invocation without target".into()))?,
                arguments: raw.arguments,
            },
            COMPLETION => HubMessage::Completion {
                invocation_id: raw.invocation_id.ok_or_else(|| {
                    RealtimeError::Protocol("completion without invocationId".into())
                })?,
                result: raw.result,
                error: raw.error,
            },
            PING => HubMessage::Ping,
            CLOSE => HubMessage::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect,
            },
            other => HubMessage::Other(other),
        };
        Ok(message)
    }

    /// Encode as a terminated record.
    pub fn encode(&self) -> Result<String, RealtimeError> {
        let json = match self {
            HubMessage::Invocation {
                invocation_id,
                target,
                arguments,
            } => serde_json::to_string(&InvocationRecord {
                kind: INVOCATION,
                invocation_id: invocation_id.as_deref(),
                target,
                arguments,
            }),
            HubMessage::Completion {
                invocation_id,
                result,
                error,
            } => {
                let mut record = serde_json::json!({
                    "type": COMPLETION,
                    "invocationId": invocation_id,
                });
                if let Some(error) = error {
                    record["error"] = Value::String(error.clone());
                } else if let Some(result) = result {
                    record["result"] = result.clone();
                }
                serde_json::to_string(&record)
            }
            HubMessage::Ping => serde_json::to_string(&serde_json::json!({ "type": PING })),
            HubMessage::Close {
                error,
                allow_reconnect,
            } => {
                let mut record = serde_json::json!({ "type": CLOSE });
                if let Some(error) = error {
                    record["error"] = Value::String(error.clone());
                }
                if *allow_reconnect {
                    record["allowReconnect"] = Value::Bool(true);
                }
                serde_json::to_string(&record)
            }
            HubMessage::Other(kind) => {
                return Err(RealtimeError::Protocol(format!(
                    "cannot encode message type {kind}"
                )))
            }
        }
        .map_err(|e| RealtimeError::Protocol(e.to_string()))?;
        Ok(format!("{json}{RECORD_SEPARATOR}"))
    }
}

/// Split a frame into its non-empty records.
pub fn split_records(text: &str) -> impl Iterator<Item = &str> {
    text.split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|record| !record.is_empty())
}

/// Parse every record in a frame.
pub fn parse_frame(text: &str) -> Vec<Result<HubMessage, RealtimeError>> {
    split_records(text).map(HubMessage::parse).collect()
}

/// Collapse invocation arguments into the payload handed to listeners.
///
/// One argument is forwarded as-is, none becomes `null`, several stay an
/// array.
pub fn payload_from_arguments(mut arguments: Vec<Value>) -> Value {
    match arguments.len() {
        0 => Value::Null,
        1 => arguments.remove(0),
        _ => Value::Array(arguments),
    }
}
