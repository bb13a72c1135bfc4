use super::channel::SignalingChannel;
use super::envelope::SignalingEnvelope;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

const INBOX_BUFFER: usize = 64;

/// In-process signaling hub connecting any number of endpoints
///
/// Stand-in for the NATS transport when both endpoints live in the same
/// process (tests, embedded AI counselor). Envelopes sent to a user with
/// no subscription are dropped, mirroring pub/sub semantics.
#[derive(Clone, Default)]
pub struct MemorySignalingHub {
    inboxes: Arc<RwLock<HashMap<String, mpsc::Sender<SignalingEnvelope>>>>,
}

impl MemorySignalingHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel bound to the given user on this hub
    pub fn channel(&self, user_id: impl Into<String>) -> MemorySignaling {
        MemorySignaling {
            hub: self.clone(),
            user_id: user_id.into(),
        }
    }
}

/// One endpoint's handle onto a [`MemorySignalingHub`]
pub struct MemorySignaling {
    hub: MemorySignalingHub,
    user_id: String,
}

#[async_trait::async_trait]
impl SignalingChannel for MemorySignaling {
    async fn send(&self, to_user_id: &str, envelope: SignalingEnvelope) -> Result<()> {
        let inboxes = self.hub.inboxes.read().await;
        match inboxes.get(to_user_id) {
            Some(tx) => {
                // A closed inbox means the peer endpoint went away;
                // like the wire transport, that is not a send error.
                if tx.send(envelope).await.is_err() {
                    debug!("Inbox for {} closed, envelope dropped", to_user_id);
                }
            }
            None => {
                debug!("No inbox for {}, envelope dropped", to_user_id);
            }
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<SignalingEnvelope>> {
        let (tx, rx) = mpsc::channel(INBOX_BUFFER);
        self.hub
            .inboxes
            .write()
            .await
            .insert(self.user_id.clone(), tx);
        Ok(rx)
    }
}
