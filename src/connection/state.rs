//! Connection manager state machine

use crate::{Error, Result};

/// Manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No current connection (initial state, or after loss/failure)
    Disconnected,

    /// Connect attempt in progress
    Connecting,

    /// A live connection is current
    Connected,
}

impl ManagerState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ManagerState) -> bool {
        use ManagerState::*;

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ManagerState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = ManagerState::Disconnected;
        assert!(state.transition(ManagerState::Connecting).is_ok());
        assert!(state.transition(ManagerState::Connected).is_ok());
        assert!(state.transition(ManagerState::Disconnected).is_ok());
    }

    #[test]
    fn test_failed_attempt_returns_to_disconnected() {
        let mut state = ManagerState::Connecting;
        assert!(state.transition(ManagerState::Disconnected).is_ok());
        assert!(state.transition(ManagerState::Connecting).is_ok());
    }

    #[test]
    fn test_cannot_skip_connecting() {
        let mut state = ManagerState::Disconnected;
        assert!(state.transition(ManagerState::Connected).is_err());
        assert_eq!(state, ManagerState::Disconnected);
    }

    #[test]
    fn test_connected_cannot_reconnect_in_place() {
        let mut state = ManagerState::Connected;
        assert!(state.transition(ManagerState::Connecting).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ManagerState::Connecting.to_string(), "connecting");
    }
}
