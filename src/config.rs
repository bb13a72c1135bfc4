use crate::call::EndpointConfig;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub signaling: SignalingConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
    #[serde(default)]
    pub analyze: AnalyzeConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SignalingConfig {
    pub nats_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ReconnectConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsConfig {
    pub period_secs: u64,
    pub confidence_threshold: f32,
    pub context_segments: usize,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            period_secs: 10,
            confidence_threshold: 0.7,
            context_segments: 5,
        }
    }
}

/// Remote analysis service; all analysis stays local when unset
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeConfig {
    pub endpoint: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Per-endpoint settings derived from the service configuration
    pub fn endpoint_config(&self, user_id: &str, display_name: &str) -> EndpointConfig {
        EndpointConfig {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            avatar: None,
            reconnect_interval: Duration::from_millis(self.reconnect.interval_ms),
            max_reconnect_attempts: self.reconnect.max_attempts,
            suggestion_period: Duration::from_secs(self.suggestions.period_secs),
            suggestion_confidence_threshold: self.suggestions.confidence_threshold,
            suggestion_context_segments: self.suggestions.context_segments,
        }
    }
}
