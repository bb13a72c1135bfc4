use super::state::CallState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a call session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStats {
    pub call_id: String,

    pub state: CallState,

    /// When the call was created
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Elapsed call time in seconds
    pub duration_secs: f64,

    /// Final transcript segments collected so far
    pub transcript_segments: usize,

    /// Sentiment samples collected so far
    pub sentiment_samples: usize,

    /// Reconnection attempts consumed in this call's lifetime
    pub reconnect_attempts: u32,
}
