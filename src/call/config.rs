use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-call feature switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOptions {
    pub video: bool,
    pub audio: bool,
    pub transcription: bool,
    pub sentiment: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
            transcription: true,
            sentiment: true,
        }
    }
}

impl CallOptions {
    pub fn audio_only() -> Self {
        Self {
            video: false,
            ..Self::default()
        }
    }
}

/// Configuration for a call endpoint
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// This endpoint's user id (stamped on outgoing envelopes)
    pub user_id: String,

    /// Display name announced to the peer
    pub display_name: String,

    pub avatar: Option<String>,

    /// Delay between reconnection attempts
    pub reconnect_interval: Duration,

    /// Maximum reconnection attempts per call lifetime
    pub max_reconnect_attempts: u32,

    /// Suggestion generator period
    pub suggestion_period: Duration,

    /// Suggestions at or below this confidence are discarded
    pub suggestion_confidence_threshold: f32,

    /// How many recent final segments feed suggestion context
    pub suggestion_context_segments: usize,
}

impl EndpointConfig {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            ..Self::default()
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            user_id: format!("user-{}", uuid::Uuid::new_v4()),
            display_name: "Anonymous".to_string(),
            avatar: None,
            reconnect_interval: Duration::from_secs(2),
            max_reconnect_attempts: 3,
            suggestion_period: Duration::from_secs(10),
            suggestion_confidence_threshold: 0.7,
            suggestion_context_segments: 5,
        }
    }
}
