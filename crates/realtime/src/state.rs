//! Connection state published by the channel connector.

use std::fmt;

/// Lifecycle phase of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Authorization, transport or configuration failure.
    Error,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Error => "error",
        };
        f.write_str(s)
    }
}

/// Snapshot of the channel's live state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    pub last_error: Option<String>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    pub(crate) fn with_phase(phase: ConnectionPhase) -> Self {
        Self {
            phase,
            last_error: None,
        }
    }

    pub(crate) fn failed(reason: impl Into<String>) -> Self {
        Self {
            phase: ConnectionPhase::Error,
            last_error: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        let state = ConnectionState::default();
        assert_eq!(state.phase, ConnectionPhase::Disconnected);
        assert!(!state.is_connected());
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_failed_is_not_connected() {
        let state = ConnectionState::failed("boom");
        assert!(!state.is_connected());
        assert_eq!(state.last_error.as_deref(), Some("boom"));
    }
}
