/// Membership in the single active chat session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Joining(String),
    Joined(String),
    Leaving(String),
}

impl SessionState {
    /// The tracked session id; `None` only when idle.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionState::Idle => None,
            SessionState::Joining(id) | SessionState::Joined(id) | SessionState::Leaving(id) => {
                Some(id)
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }
}
