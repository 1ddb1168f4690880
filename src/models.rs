//! Domain entities persisted by the content store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Dataset family a video belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Trump,
    TweedeKamer,
    VideoLibrary,
}

/// How a video's content was ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Html,
    Xml,
    VideoFile,
}

/// Lifecycle state of an out-of-scope transcoding job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One source file: an HTML or VLOS-XML transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: i64,
    pub filename: String,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub duration_seconds: Option<i32>,
    pub source: Option<String>,
    pub channel: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub format: Option<String>,
    pub candidate: Option<String>,
    pub place: Option<String>,
    pub record_type: Option<String>,
    pub dataset: Dataset,
    pub source_type: SourceType,
    pub video_thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub vimeo_video_id: Option<String>,
    pub vimeo_embed_url: Option<String>,
    pub total_words: i64,
    pub total_characters: i64,
    pub total_segments: i64,
    pub video_file_path: Option<String>,
    pub srt_file_path: Option<String>,
    pub video_format: Option<String>,
    pub video_file_size: Option<i64>,
    pub video_duration_seconds: Option<i32>,
    pub video_resolution: Option<String>,
    pub video_fps: Option<f32>,
    pub video_bitrate: Option<i32>,
    pub transcoding_status: Option<TranscodingStatus>,
    pub transcoded_file_path: Option<String>,
    pub transcoding_started_at: Option<DateTime<Utc>>,
    pub transcoding_completed_at: Option<DateTime<Utc>>,
    pub transcoding_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attributes needed to upsert a video; identifiers and derived counters are
/// computed by the store, not supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct VideoMetadata {
    pub filename: String,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub source: Option<String>,
    pub channel: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub format: Option<String>,
    pub candidate: Option<String>,
    pub place: Option<String>,
    pub record_type: Option<String>,
    pub video_thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub vimeo_video_id: Option<String>,
    pub vimeo_embed_url: Option<String>,
}

/// Canonicalized person who can be attributed a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub party: Option<String>,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub total_segments: i64,
    pub total_words: i64,
    pub avg_sentiment: Option<f64>,
}

impl Speaker {
    /// `lowercase(name).replace(' ', '_')` — the invariant §8 requires.
    pub fn normalize(name: &str) -> String {
        name.trim().to_lowercase().replace(' ', "_")
    }
}

/// A classification label assigned to segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub total_segments: i64,
    pub avg_score: Option<f64>,
}

/// Segment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    Spoken,
    Announcement,
}

impl Default for SegmentType {
    fn default() -> Self {
        Self::Spoken
    }
}

/// Named sentiment model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentModel {
    Loughran,
    Harvard,
    Vader,
}

/// Moderation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationCategory {
    Harassment,
    Hate,
    SelfHarm,
    Sexual,
    Violence,
}

impl ModerationCategory {
    pub const ALL: [ModerationCategory; 5] = [
        ModerationCategory::Harassment,
        ModerationCategory::Hate,
        ModerationCategory::SelfHarm,
        ModerationCategory::Sexual,
        ModerationCategory::Violence,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Harassment => "harassment",
            Self::Hate => "hate",
            Self::SelfHarm => "self_harm",
            Self::Sexual => "sexual",
            Self::Violence => "violence",
        }
    }
}

/// The threshold at or above which a moderation score becomes a flag.
pub const MODERATION_FLAG_THRESHOLD: f64 = 0.3;

/// Derive a moderation flag from its score per the invariant in §8.
pub fn moderation_flag(score: Option<f64>) -> bool {
    score.map(|s| s >= MODERATION_FLAG_THRESHOLD).unwrap_or(false)
}

/// One labeled utterance or text fragment within a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: i64,
    pub segment_id: String,
    pub video_id: i64,
    pub speaker_id: Option<i64>,
    pub speaker_name: Option<String>,
    pub speaker_party: Option<String>,
    pub segment_type: SegmentType,
    pub transcript_text: String,
    pub video_seconds: Option<i32>,
    pub timestamp_start: Option<String>,
    pub timestamp_end: Option<String>,
    pub duration_seconds: Option<i32>,
    pub word_count: i32,
    pub char_count: i32,
    pub sentiment_loughran_score: Option<f64>,
    pub sentiment_loughran_label: Option<String>,
    pub sentiment_harvard_score: Option<f64>,
    pub sentiment_harvard_label: Option<String>,
    pub sentiment_vader_score: Option<f64>,
    pub sentiment_vader_label: Option<String>,
    pub moderation_harassment: Option<f64>,
    pub moderation_hate: Option<f64>,
    pub moderation_self_harm: Option<f64>,
    pub moderation_sexual: Option<f64>,
    pub moderation_violence: Option<f64>,
    pub moderation_overall_score: Option<f64>,
    pub moderation_harassment_flag: bool,
    pub moderation_hate_flag: bool,
    pub moderation_self_harm_flag: bool,
    pub moderation_sexual_flag: bool,
    pub moderation_violence_flag: bool,
    pub flesch_kincaid_grade: Option<f64>,
    pub gunning_fog_index: Option<f64>,
    pub coleman_liau_index: Option<f64>,
    pub automated_readability_index: Option<f64>,
    pub smog_index: Option<f64>,
    pub flesch_reading_ease: Option<f64>,
    pub stresslens_score: Option<f64>,
    pub stresslens_rank: Option<i16>,
    pub embedding: Option<String>,
    pub embedding_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranscriptSegment {
    /// Compute `word_count`/`char_count` and moderation flags the way the
    /// store requires them to hold, given raw extracted fields.
    pub fn word_count_of(text: &str) -> i32 {
        text.split_whitespace().count() as i32
    }

    pub fn char_count_of(text: &str) -> i32 {
        text.chars().count() as i32
    }
}

/// A weighted edge between a segment and a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentTopic {
    pub id: i64,
    pub segment_id: i64,
    pub topic_id: i64,
    pub score: f64,
    pub magnitude: Option<f64>,
    pub confidence: Option<f64>,
}

/// A cached, pre-computed video summary (§10.4). Never generated in-crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSummary {
    pub video_id: i64,
    pub preset: String,
    pub text: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_case_and_spaces() {
        assert_eq!(Speaker::normalize("Aukje de Vries"), "aukje_de_vries");
        assert_eq!(Speaker::normalize("  Trump "), "trump");
    }

    #[test]
    fn moderation_flag_threshold() {
        assert!(!moderation_flag(Some(0.2999)));
        assert!(moderation_flag(Some(0.3)));
        assert!(moderation_flag(Some(0.9)));
        assert!(!moderation_flag(None));
    }

    #[test]
    fn word_and_char_counts() {
        assert_eq!(TranscriptSegment::word_count_of("This is a test."), 4);
        assert_eq!(TranscriptSegment::char_count_of("This is a test."), 15);
    }
}
