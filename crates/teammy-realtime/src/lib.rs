//! Teammy realtime client.
//!
//! One multiplexed hub connection per application instance, fan-out of the
//! hub's push events to dynamic listener sets, single-active chat session
//! membership, and the presence roster consumed by member lists.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use teammy_realtime::{RealtimeClientConfig, RealtimeSessionClient};
//!
//! # async fn run() -> Result<(), teammy_realtime::RealtimeError> {
//! let client = RealtimeSessionClient::new(
//!     RealtimeClientConfig::default(),
//!     Arc::new(|| "token".to_string()),
//! );
//! let _sub = client.on("ReceiveSessionMessage", |payload| println!("{payload}"));
//! client.join_session("sess-1").await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod hub;
pub mod presence;

pub use auth::{FileStore, KeyValueStore, MemoryStore, StorageTokenProvider, TokenProvider};
pub use client::{RealtimeClientConfig, RealtimeSessionClient, SessionState};
pub use dispatcher::{Listener, ListenerRegistry, Unsubscribe};
pub use endpoint::{hub_url, websocket_url};
pub use error::RealtimeError;
pub use events::{EventName, UnknownEvent};
pub use hub::{ConnectionState, HubConnection, HubConnector, ReconnectPolicy};
pub use presence::{group_members, MemberGroups, PresenceRoster, PresenceStatus};
