use super::sentiment::{SentimentSample, SentimentScorer};
use super::suggestion::{Suggestion, SuggestionKind};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// A slow analysis service must never stall call teardown or scoring
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the external analysis service (`POST {endpoint}/analyze`)
///
/// All three operations share one request shape:
/// `{ "operation": "analyze-sentiment" | "summarize" | "chat-completion",
///    "text" | "messages": ... }`.
/// Failures here are non-fatal by design; callers fall back to local
/// heuristics and the call continues.
pub struct AnalyzeClient {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    messages: Option<&'a [ChatMessage]>,
}

/// One turn of context for the chat-completion operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSentiment {
    pub score: f32,
    pub magnitude: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSummary {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSuggestion {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub confidence: f32,
}

impl AnalyzeClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        info!("Using remote analysis service at {}", endpoint);
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, request: AnalyzeRequest<'_>) -> Result<T> {
        let url = format!("{}/analyze", self.endpoint.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .context("Analysis request failed")?
            .error_for_status()
            .context("Analysis service returned an error status")?;

        response
            .json::<T>()
            .await
            .context("Failed to parse analysis response")
    }

    pub async fn analyze_sentiment(&self, text: &str) -> Result<RemoteSentiment> {
        self.post(AnalyzeRequest {
            operation: "analyze-sentiment",
            text: Some(text),
            messages: None,
        })
        .await
    }

    pub async fn summarize(&self, transcript: &str) -> Result<RemoteSummary> {
        self.post(AnalyzeRequest {
            operation: "summarize",
            text: Some(transcript),
            messages: None,
        })
        .await
    }

    pub async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<RemoteSuggestion> {
        self.post(AnalyzeRequest {
            operation: "chat-completion",
            text: None,
            messages: Some(messages),
        })
        .await
    }
}

/// Remote replacement for the lexicon scorer, same contract
pub struct RemoteScorer {
    client: std::sync::Arc<AnalyzeClient>,
}

impl RemoteScorer {
    pub fn new(client: std::sync::Arc<AnalyzeClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SentimentScorer for RemoteScorer {
    async fn score(&self, text: &str) -> Result<SentimentSample> {
        let remote = self.client.analyze_sentiment(text).await?;
        Ok(SentimentSample {
            score: remote.score.clamp(-1.0, 1.0),
            magnitude: remote.magnitude.max(0.0),
            text: text.to_string(),
            timestamp: Utc::now(),
        })
    }
}

// Suggestion kinds come back from the service as lowercase strings,
// matching the local serde representation.
pub(super) fn suggestion_from_remote(remote: RemoteSuggestion) -> Suggestion {
    Suggestion {
        text: remote.text,
        kind: remote.kind,
        confidence: remote.confidence.clamp(0.0, 1.0),
    }
}
