use serde::{Deserialize, Serialize};

/// Call session state
///
/// `Idle → Connecting → Connected ⇄ Reconnecting → Disconnected | Error`;
/// any active state reaches `Ended` on explicit hangup. `Idle` is both
/// the initial state and the state after successful cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    Ended,
    Error,
}

impl CallState {
    /// Terminal states; a session reaching one is logically destroyed
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Ended | Self::Error)
    }

    /// Non-idle, non-terminal: a call is in progress
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }

    /// Legality of a single transition
    ///
    /// Note `Idle → Connected` is never legal; a call must pass through
    /// `Connecting`.
    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        match (self, next) {
            (Idle, Connecting) => true,
            (Connecting, Connected | Ended | Disconnected | Error) => true,
            (Connected, Reconnecting | Ended | Disconnected | Error) => true,
            (Reconnecting, Connected | Ended | Disconnected | Error) => true,
            (Disconnected | Ended | Error, Idle) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
