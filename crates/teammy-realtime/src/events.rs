//! Hub event and method names.

use std::fmt;
use std::str::FromStr;

/// Server push events a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    ReceiveSessionMessage,
    SessionPresenceChanged,
    ReceiveTyping,
    TypingSession,
    PresenceChanged,
}

impl EventName {
    pub const ALL: [EventName; 5] = [
        EventName::ReceiveSessionMessage,
        EventName::SessionPresenceChanged,
        EventName::ReceiveTyping,
        EventName::TypingSession,
        EventName::PresenceChanged,
    ];

    /// The wire name used by the hub.
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::ReceiveSessionMessage => "ReceiveSessionMessage",
            EventName::SessionPresenceChanged => "SessionPresenceChanged",
            EventName::ReceiveTyping => "ReceiveTyping",
            EventName::TypingSession => "TypingSession",
            EventName::PresenceChanged => "PresenceChanged",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event name: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventName {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// Remote methods invoked on the hub.
pub mod methods {
    pub const JOIN_SESSION: &str = "JoinSession";
    pub const LEAVE_SESSION: &str = "LeaveSession";
    pub const TYPING_SESSION: &str = "TypingSession";
}
