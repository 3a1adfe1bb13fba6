use std::time::Duration;

use teammy_common::TeammyError;

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("not connected")]
    NotConnected,

    #[error("hub error: {0}")]
    Hub(String),

    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),

    #[error("invalid hub url: {0}")]
    InvalidUrl(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<RealtimeError> for TeammyError {
    fn from(err: RealtimeError) -> Self {
        TeammyError::Realtime(err.to_string())
    }
}
