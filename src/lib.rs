pub mod analysis;
pub mod call;
pub mod config;
pub mod media;
pub mod signaling;
pub mod transcription;

pub use analysis::{
    AnalyzeClient, CallSummary, LexiconScorer, SentimentLabel, SentimentSample, SentimentScorer,
    Suggestion, SuggestionEngine, SuggestionKind, SummaryGenerator,
};
pub use call::{
    CallEndpoint, CallEvent, CallOptions, CallParticipant, CallState, CallStats, EndpointConfig,
};
pub use config::Config;
pub use media::{
    ConnectivityState, MediaConnector, MediaConstraints, MediaStreamInfo, MediaTransport,
    TrackKind, TransportEvent,
};
pub use signaling::{
    MemorySignalingHub, NatsSignaling, Signal, SignalingChannel, SignalingEnvelope,
};
pub use transcription::{
    TranscriptSegment, TranscriptStore, TranscriptionProvider, TranscriptionResult,
};
