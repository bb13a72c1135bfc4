use super::channel::SignalingChannel;
use super::envelope::SignalingEnvelope;
use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Capacity of the inbound envelope buffer
const INBOX_BUFFER: usize = 64;

/// NATS-backed signaling channel
///
/// Each user has a dedicated subject (`call.signal.<user_id>`); envelopes
/// are published as JSON to the recipient's subject.
pub struct NatsSignaling {
    client: Client,
    user_id: String,
}

impl NatsSignaling {
    /// Connect to NATS server
    pub async fn connect(url: &str, user_id: String) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client, user_id })
    }

    fn subject_for(user_id: &str) -> String {
        format!("call.signal.{}", user_id)
    }
}

#[async_trait::async_trait]
impl SignalingChannel for NatsSignaling {
    async fn send(&self, to_user_id: &str, envelope: SignalingEnvelope) -> Result<()> {
        let subject = Self::subject_for(to_user_id);
        let kind = envelope.kind();
        let payload = serde_json::to_vec(&envelope)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish signaling envelope")?;

        info!(
            "Published {} envelope to {} (call={})",
            kind, subject, envelope.call_id
        );

        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<SignalingEnvelope>> {
        let subject = Self::subject_for(&self.user_id);

        info!("Subscribing to signaling on {}", subject);

        let mut subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to signaling subject")?;

        let (tx, rx) = mpsc::channel(INBOX_BUFFER);

        // Pump the NATS subscriber into a typed channel; malformed
        // envelopes are logged and skipped.
        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<SignalingEnvelope>(&msg.payload) {
                    Ok(envelope) => {
                        if tx.send(envelope).await.is_err() {
                            break; // receiver dropped, endpoint is gone
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse signaling envelope: {}", e);
                    }
                }
            }
            info!("Signaling subscription on {} closed", subject);
        });

        Ok(rx)
    }
}
