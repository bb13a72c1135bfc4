use super::envelope::SignalingEnvelope;
use anyhow::Result;
use tokio::sync::mpsc;

/// Bidirectional signaling transport between call endpoints
///
/// Implementations:
/// - NATS: one subject per user, JSON envelopes (production)
/// - Memory: in-process paired inboxes (tests, embedded use)
#[async_trait::async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Deliver an envelope to the given user's inbox
    async fn send(&self, to_user_id: &str, envelope: SignalingEnvelope) -> Result<()>;

    /// Subscribe to envelopes addressed to this endpoint's own user
    ///
    /// Returns a channel receiver that will receive inbound envelopes
    async fn subscribe(&self) -> Result<mpsc::Receiver<SignalingEnvelope>>;
}
