use super::participant::CallParticipant;
use super::state::CallState;
use super::stats::CallStats;
use crate::analysis::{CallSummary, SuggestionKind};
use crate::media::MediaStreamInfo;
use crate::signaling::OfferPayload;
use serde::Serialize;

/// Tagged event stream emitted by a call endpoint
///
/// The UI/collaborator layer subscribes to these over a broadcast
/// channel; no other coupling to the core exists.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum CallEvent {
    /// Emitted on every state machine transition
    StateChanged {
        previous: CallState,
        current: CallState,
    },

    /// An offer arrived while idle; `answer_call` accepts it
    IncomingCall {
        call_id: String,
        from_user_id: String,
        offer: OfferPayload,
    },

    LocalStreamAdded {
        stream: MediaStreamInfo,
    },

    RemoteStreamAdded {
        stream: MediaStreamInfo,
    },

    /// A participant's track flags changed (local toggle or remote track)
    ParticipantUpdated {
        participant: CallParticipant,
    },

    /// Interim or final recognition result
    TranscriptionResult {
        user_id: String,
        text: String,
        is_final: bool,
    },

    /// Sentiment for one final segment
    SentimentResult {
        score: f32,
        magnitude: f32,
        text: String,
    },

    /// A suggestion that cleared the confidence gate
    Suggestion {
        text: String,
        #[serde(rename = "type")]
        kind: SuggestionKind,
        confidence: f32,
    },

    /// Post-call summary (only when the transcript is non-empty)
    Summary {
        summary: CallSummary,
    },

    /// The call reached a terminal state
    CallEnded {
        stats: CallStats,
    },

    /// User-visible failure
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
}
