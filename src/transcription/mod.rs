//! Transcription adapter
//!
//! Wraps an external speech-to-text engine behind the
//! [`TranscriptionProvider`] trait and defines the transcript store fed
//! by it. Interim results are surfaced to consumers but never stored;
//! only final segments enter the permanent transcript.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A single recognition result from the speech-to-text engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    /// Speaker this result belongs to
    pub user_id: String,

    /// Recognized text (may be revised while `is_final` is false)
    pub text: String,

    /// False for interim (low-latency, revisable) results
    pub is_final: bool,
}

/// Continuous speech recognition source
///
/// Implemented by the platform speech engine (browser SpeechRecognition,
/// Whisper service, ...); the crate consumes only its results.
#[async_trait::async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Start recognizing the given speaker's audio
    ///
    /// Returns a channel receiver that will receive interim and final
    /// results until `stop` is called or the provider shuts down.
    async fn start(&self, user_id: &str) -> Result<mpsc::Receiver<TranscriptionResult>>;

    /// Stop recognition and release engine resources
    async fn stop(&self) -> Result<()>;
}

/// A finalized transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub user_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub is_final: bool,
}

impl TranscriptSegment {
    /// Build a final segment stamped with the current time
    pub fn finalized(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            timestamp: Utc::now(),
            is_final: true,
        }
    }
}

/// Append-only, timestamp-ordered store of final segments
#[derive(Debug, Default)]
pub struct TranscriptStore {
    segments: Vec<TranscriptSegment>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a final segment; interim segments are refused
    ///
    /// Returns whether the segment was stored.
    pub fn append(&mut self, segment: TranscriptSegment) -> bool {
        if !segment.is_final {
            return false;
        }
        // Appends are stamped at arrival, so order is monotonic; a
        // skewed clock must not break the ordering invariant.
        let mut segment = segment;
        if let Some(last) = self.segments.last() {
            if segment.timestamp < last.timestamp {
                segment.timestamp = last.timestamp;
            }
        }
        self.segments.push(segment);
        true
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The most recent `count` segments, newest first
    pub fn recent(&self, count: usize) -> Vec<TranscriptSegment> {
        self.segments.iter().rev().take(count).cloned().collect()
    }
}
