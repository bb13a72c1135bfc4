use super::remote::AnalyzeClient;
use super::sentiment::{mean_score, SentimentLabel, SentimentSample};
use super::suggestion::has_action_phrase;
use crate::transcription::TranscriptSegment;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Post-call aggregation of the full transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    pub duration_seconds: i64,
    pub topics: Vec<String>,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub sentiment_label: SentimentLabel,
}

const MAX_TOPICS: usize = 5;
const MAX_KEY_POINTS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "because", "before", "being", "could", "doing", "during",
    "every", "might", "other", "really", "should", "their", "there", "these", "thing",
    "things", "think", "those", "today", "where", "which", "while", "would", "going",
];

/// Builds the one-shot call summary on the terminal edge
///
/// Remote summarization when configured, local heuristic otherwise; the
/// sentiment label always comes from the local sample history.
pub struct SummaryGenerator {
    remote: Option<Arc<AnalyzeClient>>,
}

impl SummaryGenerator {
    pub fn new(remote: Option<Arc<AnalyzeClient>>) -> Self {
        Self { remote }
    }

    /// Generate the summary; `None` when the transcript is empty
    pub async fn generate(
        &self,
        transcript: &[TranscriptSegment],
        samples: &[SentimentSample],
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<CallSummary>> {
        if transcript.is_empty() {
            return Ok(None);
        }

        let duration_seconds = (ended_at - started_at).num_seconds().max(0);
        let sentiment_label = SentimentLabel::from_score(mean_score(samples));

        if let Some(client) = &self.remote {
            let full_text = transcript
                .iter()
                .map(|s| format!("{}: {}", s.user_id, s.text))
                .collect::<Vec<_>>()
                .join("\n");

            match client.summarize(&full_text).await {
                Ok(remote) => {
                    return Ok(Some(CallSummary {
                        duration_seconds,
                        topics: remote.topics,
                        key_points: remote.key_points,
                        action_items: remote.action_items,
                        sentiment_label,
                    }));
                }
                Err(e) => {
                    warn!("Remote summarization failed, using local heuristic: {}", e);
                }
            }
        }

        Ok(Some(CallSummary {
            duration_seconds,
            topics: extract_topics(transcript),
            key_points: extract_key_points(transcript),
            action_items: extract_action_items(transcript),
            sentiment_label,
        }))
    }
}

/// Most frequent substantive words across the transcript
fn extract_topics(transcript: &[TranscriptSegment]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for segment in transcript {
        for token in segment
            .text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
        {
            if token.len() < 5 || STOP_WORDS.contains(&token) {
                continue;
            }
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(MAX_TOPICS)
        .map(|(word, _)| word)
        .collect()
}

/// Longest utterances carry the most content
fn extract_key_points(transcript: &[TranscriptSegment]) -> Vec<String> {
    let mut by_length: Vec<&TranscriptSegment> = transcript.iter().collect();
    by_length.sort_by(|a, b| b.text.len().cmp(&a.text.len()));
    by_length
        .into_iter()
        .take(MAX_KEY_POINTS)
        .map(|s| s.text.clone())
        .collect()
}

fn extract_action_items(transcript: &[TranscriptSegment]) -> Vec<String> {
    transcript
        .iter()
        .filter(|s| has_action_phrase(&s.text))
        .map(|s| s.text.clone())
        .collect()
}
