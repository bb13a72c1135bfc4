//! Sentiment, suggestion, and summary pipeline
//!
//! Consumes final transcript segments:
//! - per-segment sentiment scoring (local lexicon or remote service)
//! - periodic confidence-gated suggestions while a call is connected
//! - one-shot post-call summary

pub mod remote;
pub mod sentiment;
pub mod suggestion;
pub mod summary;

pub use remote::{AnalyzeClient, ChatMessage, RemoteScorer};
pub use sentiment::{mean_score, LexiconScorer, SentimentLabel, SentimentSample, SentimentScorer};
pub use suggestion::{Suggestion, SuggestionEngine, SuggestionKind};
pub use summary::{CallSummary, SummaryGenerator};
