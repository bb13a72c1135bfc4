// Unit tests for the sentiment lexicon, suggestion heuristics, and
// post-call summary generation.

use chrono::{Duration, Utc};
use counsel_calls::analysis::sentiment::mean_score;
use counsel_calls::{
    LexiconScorer, SentimentLabel, SentimentSample, SentimentScorer, SuggestionEngine,
    SuggestionKind, SummaryGenerator, TranscriptSegment,
};

fn sample(score: f32) -> SentimentSample {
    SentimentSample {
        score,
        magnitude: 0.1,
        text: String::new(),
        timestamp: Utc::now(),
    }
}

#[test]
fn test_lexicon_all_positive() {
    let (score, magnitude) = LexiconScorer::score_text("I feel good and hopeful today");
    assert_eq!(score, 1.0);
    assert!((magnitude - 0.2).abs() < f32::EPSILON);
}

#[test]
fn test_lexicon_all_negative() {
    let (score, magnitude) = LexiconScorer::score_text("so anxious and scared");
    assert_eq!(score, -1.0);
    assert!((magnitude - 0.2).abs() < f32::EPSILON);
}

#[test]
fn test_lexicon_balanced_hits_score_zero() {
    let (score, magnitude) = LexiconScorer::score_text("happy but also sad");
    assert_eq!(score, 0.0);
    assert!((magnitude - 0.2).abs() < f32::EPSILON);
}

#[test]
fn test_lexicon_no_hits_is_neutral() {
    let (score, magnitude) = LexiconScorer::score_text("the meeting starts at noon");
    assert_eq!(score, 0.0);
    assert_eq!(magnitude, 0.0);
}

#[test]
fn test_lexicon_matches_whole_words_case_insensitively() {
    // "goodbye" must not count as "good"
    let (score, _) = LexiconScorer::score_text("Goodbye for now");
    assert_eq!(score, 0.0);

    let (score, _) = LexiconScorer::score_text("GRATEFUL, truly.");
    assert_eq!(score, 1.0);
}

#[tokio::test]
async fn test_scorer_trait_produces_sample() {
    let scorer = LexiconScorer::new();
    let sample = scorer.score("thank you, that was helpful").await.unwrap();
    assert_eq!(sample.score, 1.0);
    assert_eq!(sample.text, "thank you, that was helpful");
}

#[test]
fn test_label_bands() {
    assert_eq!(SentimentLabel::from_score(0.8), SentimentLabel::VeryPositive);
    assert_eq!(SentimentLabel::from_score(0.3), SentimentLabel::Positive);
    assert_eq!(SentimentLabel::from_score(0.0), SentimentLabel::Neutral);
    assert_eq!(SentimentLabel::from_score(-0.3), SentimentLabel::Negative);
    assert_eq!(SentimentLabel::from_score(-0.8), SentimentLabel::VeryNegative);
}

#[test]
fn test_label_band_boundaries_fall_to_the_lower_band() {
    assert_eq!(SentimentLabel::from_score(0.5), SentimentLabel::Positive);
    assert_eq!(SentimentLabel::from_score(0.1), SentimentLabel::Neutral);
    assert_eq!(SentimentLabel::from_score(-0.1), SentimentLabel::Negative);
    assert_eq!(SentimentLabel::from_score(-0.5), SentimentLabel::VeryNegative);
}

#[test]
fn test_mean_score_balances_out() {
    let samples = vec![sample(1.0), sample(-1.0)];
    let mean = mean_score(&samples);
    assert_eq!(mean, 0.0);
    assert_eq!(SentimentLabel::from_score(mean), SentimentLabel::Neutral);
}

#[test]
fn test_mean_score_of_nothing_is_zero() {
    assert_eq!(mean_score(&[]), 0.0);
}

#[test]
fn test_label_display() {
    assert_eq!(SentimentLabel::VeryPositive.to_string(), "Very Positive");
    assert_eq!(SentimentLabel::Neutral.to_string(), "Neutral");
}

// --- suggestions ---

fn context(text: &str) -> Vec<TranscriptSegment> {
    vec![TranscriptSegment::finalized("caller", text)]
}

#[tokio::test]
async fn test_question_suggests_a_response() {
    let engine = SuggestionEngine::new(None);
    let suggestion = engine
        .generate(&context("What should I do about this?"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(suggestion.kind, SuggestionKind::Response);
    assert_eq!(suggestion.confidence, 0.8);
}

#[tokio::test]
async fn test_negative_sentiment_suggests_a_question() {
    let engine = SuggestionEngine::new(None);
    let suggestion = engine
        .generate(&context("I have felt so sad and alone lately"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(suggestion.kind, SuggestionKind::Question);
    assert_eq!(suggestion.confidence, 0.75);
}

#[tokio::test]
async fn test_action_phrase_suggests_an_action() {
    let engine = SuggestionEngine::new(None);
    let suggestion = engine
        .generate(&context("I will follow up with the clinic tomorrow"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(suggestion.kind, SuggestionKind::Action);
    assert_eq!(suggestion.confidence, 0.72);
}

#[tokio::test]
async fn test_generic_text_stays_below_the_confidence_gate() {
    let engine = SuggestionEngine::new(None);
    let suggestion = engine
        .generate(&context("The weather was fine this morning"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(suggestion.kind, SuggestionKind::Information);
    assert!(suggestion.confidence < 0.7);
}

#[tokio::test]
async fn test_empty_context_yields_no_suggestion() {
    let engine = SuggestionEngine::new(None);
    assert!(engine.generate(&[]).await.unwrap().is_none());
}

#[test]
fn test_suggestion_kind_serializes_lowercase() {
    assert_eq!(
        serde_json::to_string(&SuggestionKind::Response).unwrap(),
        "\"response\""
    );
}

// --- summary ---

#[tokio::test]
async fn test_summary_of_empty_transcript_is_none() {
    let generator = SummaryGenerator::new(None);
    let now = Utc::now();
    let summary = generator.generate(&[], &[], now, now).await.unwrap();
    assert!(summary.is_none());
}

#[tokio::test]
async fn test_summary_aggregates_transcript() {
    let generator = SummaryGenerator::new(None);
    let transcript = vec![
        TranscriptSegment::finalized("caller", "My anxiety has been bad this week"),
        TranscriptSegment::finalized(
            "counselor",
            "Let's talk through what triggers the anxiety and what has helped before",
        ),
        TranscriptSegment::finalized("caller", "I need to schedule an appointment"),
    ];
    let samples = vec![sample(-0.4), sample(-0.2)];
    let started = Utc::now();
    let ended = started + Duration::seconds(90);

    let summary = generator
        .generate(&transcript, &samples, started, ended)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.duration_seconds, 90);
    assert_eq!(summary.sentiment_label, SentimentLabel::Negative);

    // "anxiety" appears twice, so it leads the topics
    assert_eq!(summary.topics.first().map(String::as_str), Some("anxiety"));

    // Key points are the longest utterances
    assert!(summary.key_points.len() <= 3);
    assert_eq!(summary.key_points[0], transcript[1].text);

    // The "need to" segment becomes an action item
    assert_eq!(summary.action_items, vec![transcript[2].text.clone()]);
}

#[tokio::test]
async fn test_summary_duration_never_negative() {
    let generator = SummaryGenerator::new(None);
    let transcript = vec![TranscriptSegment::finalized("caller", "hello")];
    let started = Utc::now();
    let ended = started - Duration::seconds(5); // skewed clock

    let summary = generator
        .generate(&transcript, &[], started, ended)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.duration_seconds, 0);
}
