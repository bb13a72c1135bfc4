use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scored utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentSample {
    /// -1.0 (negative) to 1.0 (positive)
    pub score: f32,

    /// Intensity proxy, 0.0 and up
    pub magnitude: f32,

    /// Text the sample was computed from
    pub text: String,

    pub timestamp: DateTime<Utc>,
}

/// Sentiment scoring backend
///
/// The local lexicon scorer is the default; a remote scorer can replace
/// it without changing the contract (text in, sample out).
#[async_trait::async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<SentimentSample>;
}

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "happy", "hope", "hopeful", "better", "calm", "calmer", "grateful",
    "thanks", "thank", "love", "helpful", "support", "supported", "relieved", "safe",
    "glad", "progress", "improve", "improving", "proud", "wonderful", "excellent",
];

const NEGATIVE_WORDS: &[&str] = &[
    "sad", "bad", "angry", "anxious", "anxiety", "afraid", "scared", "worse", "hopeless",
    "alone", "lonely", "hurt", "pain", "cry", "crying", "depressed", "stress", "stressed",
    "worried", "worry", "fear", "terrible", "awful", "hate", "tired", "overwhelmed",
];

/// Lexicon-based sentiment scorer
///
/// Counts positive/negative lexicon hits in the lower-cased text:
/// `score = (pos - neg) / (pos + neg)` (0 when no hits),
/// `magnitude = (pos + neg) / 10`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    /// Raw (score, magnitude) for a piece of text
    pub fn score_text(text: &str) -> (f32, f32) {
        let lowered = text.to_lowercase();
        let mut pos = 0u32;
        let mut neg = 0u32;

        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            if POSITIVE_WORDS.contains(&token) {
                pos += 1;
            } else if NEGATIVE_WORDS.contains(&token) {
                neg += 1;
            }
        }

        let total = pos + neg;
        if total == 0 {
            return (0.0, 0.0);
        }

        let score = (pos as f32 - neg as f32) / total as f32;
        let magnitude = total as f32 / 10.0;
        (score, magnitude)
    }
}

#[async_trait::async_trait]
impl SentimentScorer for LexiconScorer {
    async fn score(&self, text: &str) -> Result<SentimentSample> {
        let (score, magnitude) = Self::score_text(text);
        Ok(SentimentSample {
            score,
            magnitude,
            text: text.to_string(),
            timestamp: Utc::now(),
        })
    }
}

/// Overall sentiment bucket for a set of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    #[serde(rename = "Very Positive")]
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    #[serde(rename = "Very Negative")]
    VeryNegative,
}

impl SentimentLabel {
    /// Bucket a mean score into one of the five bands
    pub fn from_score(score: f32) -> Self {
        if score > 0.5 {
            Self::VeryPositive
        } else if score > 0.1 {
            Self::Positive
        } else if score > -0.1 {
            Self::Neutral
        } else if score > -0.5 {
            Self::Negative
        } else {
            Self::VeryNegative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryPositive => "Very Positive",
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
            Self::VeryNegative => "Very Negative",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean score across samples (0 when empty)
pub fn mean_score(samples: &[SentimentSample]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.score).sum::<f32>() / samples.len() as f32
}
