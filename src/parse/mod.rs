//! Pure, I/O-free parsing of the two supported transcript formats.

pub mod html;
pub mod vlos;

use crate::models::VideoMetadata;

/// A parsed segment, prior to speaker/topic resolution against the store.
#[derive(Debug, Clone, Default)]
pub struct ParsedSegment {
    pub segment_id: String,
    pub speaker_name: Option<String>,
    pub speaker_party: Option<String>,
    pub segment_type: crate::models::SegmentType,
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
    pub flesch_kincaid_grade: Option<f64>,
    pub gunning_fog_index: Option<f64>,
    pub coleman_liau_index: Option<f64>,
    pub automated_readability_index: Option<f64>,
    pub smog_index: Option<f64>,
    pub flesch_reading_ease: Option<f64>,
    pub stresslens_score: Option<f64>,
    pub stresslens_rank: Option<i16>,
    pub primary_topic: Option<String>,
}

/// A non-fatal issue encountered while parsing one file; collected rather
/// than raised, per §4.2/§4.3's "never throws on malformed input" contract.
#[derive(Debug, Clone)]
pub struct ParseWarning {
    pub context: String,
    pub message: String,
}

/// Session-level extras a VLOS document carries alongside its utterances:
/// chair, attendees, administrative timings, and the opening summary line.
/// `None`/empty for HTML-sourced videos, which have no such session.
#[derive(Debug, Clone, Default)]
pub struct SessionMetadata {
    pub chair: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub summary_intro: Option<String>,
    pub members: Vec<String>,
    pub ministers: Vec<(String, Option<String>)>,
}

/// The result of parsing one source file.
#[derive(Debug, Clone, Default)]
pub struct ParsedVideo {
    pub metadata: VideoMetadata,
    pub segments: Vec<ParsedSegment>,
    pub warnings: Vec<ParseWarning>,
    pub session: SessionMetadata,
}
