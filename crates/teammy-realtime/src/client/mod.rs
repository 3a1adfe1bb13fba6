//! Realtime session client: connection lifecycle, listener registration and
//! single-active session membership.

mod session;
mod session_client;

pub use session::SessionState;
pub use session_client::{RealtimeClientConfig, RealtimeSessionClient};
