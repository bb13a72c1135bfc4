use super::remote::{suggestion_from_remote, AnalyzeClient, ChatMessage};
use super::sentiment::LexiconScorer;
use crate::transcription::TranscriptSegment;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// What a suggestion asks the counselor to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Response,
    Question,
    Information,
    Action,
}

/// An in-call prompt for the counselor; ephemeral, never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub confidence: f32,
}

/// Generates suggestions from recent transcript context
///
/// Uses the remote chat-completion operation when a service is
/// configured, falling back to a local heuristic keyed off the latest
/// segment. Confidence gating happens at the emission site, not here:
/// low-confidence suggestions are still computed and returned.
pub struct SuggestionEngine {
    remote: Option<Arc<AnalyzeClient>>,
}

impl SuggestionEngine {
    pub fn new(remote: Option<Arc<AnalyzeClient>>) -> Self {
        Self { remote }
    }

    /// Generate one suggestion from context segments (newest first)
    pub async fn generate(&self, context: &[TranscriptSegment]) -> Result<Option<Suggestion>> {
        let Some(latest) = context.first() else {
            return Ok(None);
        };

        if let Some(client) = &self.remote {
            let messages: Vec<ChatMessage> = context
                .iter()
                .rev() // chronological order for the model
                .map(|segment| ChatMessage {
                    role: "user".to_string(),
                    content: format!("{}: {}", segment.user_id, segment.text),
                })
                .collect();

            match client.chat_completion(&messages).await {
                Ok(remote) => return Ok(Some(suggestion_from_remote(remote))),
                Err(e) => {
                    warn!("Remote suggestion failed, using local heuristic: {}", e);
                }
            }
        }

        Ok(Some(Self::heuristic(latest)))
    }

    // Fixed per-rule confidences keep the >0.7 emission gate meaningful;
    // the generic rule sits deliberately below it.
    fn heuristic(latest: &TranscriptSegment) -> Suggestion {
        let text = latest.text.trim();
        let (score, _) = LexiconScorer::score_text(text);

        if text.ends_with('?') {
            Suggestion {
                text: "They asked a question. Acknowledge it directly before moving on."
                    .to_string(),
                kind: SuggestionKind::Response,
                confidence: 0.8,
            }
        } else if score < -0.2 {
            Suggestion {
                text: "Sentiment is trending negative. Ask how they are feeling right now."
                    .to_string(),
                kind: SuggestionKind::Question,
                confidence: 0.75,
            }
        } else if has_action_phrase(text) {
            Suggestion {
                text: "Capture this as a concrete next step and confirm who owns it.".to_string(),
                kind: SuggestionKind::Action,
                confidence: 0.72,
            }
        } else {
            Suggestion {
                text: "Reflect back what you heard to confirm understanding.".to_string(),
                kind: SuggestionKind::Information,
                confidence: 0.55,
            }
        }
    }
}

pub(super) fn has_action_phrase(text: &str) -> bool {
    let lowered = text.to_lowercase();
    ["i will", "we will", "need to", "going to", "follow up", "schedule"]
        .iter()
        .any(|phrase| lowered.contains(phrase))
}
