use serde::{Deserialize, Serialize};

/// A single signaling message exchanged between two call endpoints.
///
/// Wire format (JSON):
/// `{ "callId": "...", "fromUserId": "...", "type": "offer", "payload": { ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingEnvelope {
    /// Call this envelope belongs to
    pub call_id: String,

    /// User that sent the envelope (stamped by the sender)
    pub from_user_id: String,

    /// Message type and type-specific payload
    #[serde(flatten)]
    pub signal: Signal,
}

impl SignalingEnvelope {
    pub fn new(call_id: impl Into<String>, from_user_id: impl Into<String>, signal: Signal) -> Self {
        Self {
            call_id: call_id.into(),
            from_user_id: from_user_id.into(),
            signal,
        }
    }

    /// Message type name as it appears on the wire (for logging)
    pub fn kind(&self) -> &'static str {
        match self.signal {
            Signal::Offer(_) => "offer",
            Signal::Answer(_) => "answer",
            Signal::IceCandidate(_) => "iceCandidate",
            Signal::Hangup(_) => "hangup",
            Signal::Reconnect(_) => "reconnect",
            Signal::Reject(_) => "reject",
            Signal::Error(_) => "error",
        }
    }
}

/// Type-specific payload of a signaling envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Signal {
    Offer(OfferPayload),
    Answer(AnswerPayload),
    IceCandidate(IceCandidatePayload),
    Hangup(HangupPayload),
    Reconnect(ReconnectPayload),
    Reject(RejectPayload),
    Error(ErrorPayload),
}

/// SDP offer, sent when initiating a call or renegotiating after connectivity loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPayload {
    pub sdp: String,

    /// True when this offer renegotiates an existing call
    #[serde(default)]
    pub is_reconnect: bool,
}

/// SDP answer replying to an offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub sdp: String,
}

/// ICE candidate discovered during negotiation, trickled to the peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidatePayload {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u32>,
}

/// Explicit call termination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HangupPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Notice that the sender lost connectivity and is about to renegotiate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPayload {
    /// 1-based attempt number within the call lifetime
    pub attempt: u32,
}

/// Refusal of an incoming offer (e.g. the endpoint is already in a call)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectPayload {
    pub reason: String,
}

/// Fatal endpoint-side failure, lets the peer tear down too
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
}
