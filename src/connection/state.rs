//! Connection state machine

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket live, buffer may hold partial data
    Open,

    /// Socket released, buffer discarded (terminal)
    Closed,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!((self, next), (Open, Closed))
    }

    /// Transition to new state, returning whether the state changed.
    ///
    /// Closing an already closed connection is accepted and reported as no change.
    pub fn transition(&mut self, next: ConnectionState) -> bool {
        if !self.can_transition_to(next) {
            return false;
        }
        *self = next;
        true
    }

    /// Whether the connection can still carry traffic
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
