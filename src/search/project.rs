//! Pure row → search-document projection (C5). No I/O: callers join rows out
//! of the Content Store and pass them in.

use serde_json::{Value, json};

use crate::models::{ModerationCategory, TranscriptSegment, Video};

/// Topic name plus its edge score, already ordered by the caller.
pub type TopicScore = (String, f64);

/// Detect a closed-set language code for `text`. Primary detector:
/// `whatlang`; fallback: a stopword-frequency heuristic across five
/// languages; texts under 10 characters always return `en` (§4.5, §8).
pub fn detect_language(text: &str) -> &'static str {
    let trimmed = text.trim();
    if trimmed.chars().count() < 10 {
        return "en";
    }

    if let Some(info) = whatlang::detect(trimmed) {
        if let Some(code) = map_whatlang(info.lang()) {
            return code;
        }
    }

    stopword_fallback(trimmed)
}

fn map_whatlang(lang: whatlang::Lang) -> Option<&'static str> {
    use whatlang::Lang;
    Some(match lang {
        Lang::Eng => "en",
        Lang::Nld => "nl",
        Lang::Deu => "de",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Pol => "pl",
        Lang::Rus => "ru",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Ara => "ar",
        _ => return None,
    })
}

const STOPWORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "is", "of", "to", "in", "a"]),
    ("nl", &["de", "het", "een", "van", "en", "is", "dat"]),
    ("de", &["der", "die", "das", "und", "ist", "ein", "zu"]),
    ("fr", &["le", "la", "les", "et", "est", "un", "de"]),
    ("es", &["el", "la", "los", "y", "es", "un", "de"]),
];

fn stopword_fallback(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let mut best = "en";
    let mut best_count = 0usize;
    for (lang, stopwords) in STOPWORDS {
        let count = words.iter().filter(|w| stopwords.contains(w)).count();
        if count > best_count {
            best_count = count;
            best = lang;
        }
    }
    best
}

/// Build the deep link used by both the `segments` document and result
/// mapping's `segment_url` field.
pub fn segment_url(video_id: i64, video_seconds: Option<i32>, segment_id: &str) -> String {
    match video_seconds {
        Some(s) => format!("/videos/{video_id}?t={s}&segment_id={segment_id}"),
        None => format!("/videos/{video_id}?segment_id={segment_id}"),
    }
}

fn moderation_block(
    harassment: (Option<f64>, bool),
    hate: (Option<f64>, bool),
    self_harm: (Option<f64>, bool),
    sexual: (Option<f64>, bool),
    violence: (Option<f64>, bool),
) -> Value {
    let cat = |(score, flag): (Option<f64>, bool)| json!({ "flag": flag, "score": score });
    json!({
        ModerationCategory::Harassment.as_str(): cat(harassment),
        ModerationCategory::Hate.as_str(): cat(hate),
        ModerationCategory::SelfHarm.as_str(): cat(self_harm),
        ModerationCategory::Sexual.as_str(): cat(sexual),
        ModerationCategory::Violence.as_str(): cat(violence),
    })
}

/// Project one segment (joined with its video and ordered topic edges) into
/// a flat `segments`-index document (§4.5).
pub fn project_segment(segment: &TranscriptSegment, video: &Video, topics: &[TopicScore]) -> Value {
    let topic_names: Vec<&str> = topics.iter().map(|(name, _)| name.as_str()).collect();

    json!({
        "id": segment.id.to_string(),
        "videoId": video.id,
        "text": segment.transcript_text,
        "speaker": segment.speaker_name,
        "topic": topic_names,
        "language": detect_language(&segment.transcript_text),
        "date": video.date.map(|d| d.to_string()),
        "video_seconds": segment.video_seconds,
        "segment_url": segment_url(video.id, segment.video_seconds, &segment.segment_id),
        "video_title": video.title,
        "source": video.source,
        "candidate": video.candidate,
        "record_type": video.record_type,
        "format": video.format,
        "sentiment": {
            "vader": { "score": segment.sentiment_vader_score, "label": segment.sentiment_vader_label },
            "loughran": { "score": segment.sentiment_loughran_score, "label": segment.sentiment_loughran_label },
            "harvard": { "score": segment.sentiment_harvard_score, "label": segment.sentiment_harvard_label },
        },
        "moderation": moderation_block(
            (segment.moderation_harassment, segment.moderation_harassment_flag),
            (segment.moderation_hate, segment.moderation_hate_flag),
            (segment.moderation_self_harm, segment.moderation_self_harm_flag),
            (segment.moderation_sexual, segment.moderation_sexual_flag),
            (segment.moderation_violence, segment.moderation_violence_flag),
        ),
        "readability": {
            "flesch_kincaid": segment.flesch_kincaid_grade,
            "gunning_fog": segment.gunning_fog_index,
            "coleman_liau": segment.coleman_liau_index,
            "flesch_reading_ease": segment.flesch_reading_ease,
            "smog": segment.smog_index,
            "ari": segment.automated_readability_index,
        },
    })
}

/// Aggregated moderation/sentiment/stresslens/document stats for one video,
/// computed by the caller across its segments before projection.
#[derive(Debug, Clone, Default)]
pub struct VideoAggregates {
    pub moderation: [(bool, Option<f64>); 5],
    pub stresslens_avg_score: Option<f64>,
    pub stresslens_modal_rank: Option<i16>,
    pub speaking_time_s: Option<i32>,
    pub sentence_count: Option<i64>,
    pub word_count: Option<i64>,
    pub duration_s: Option<i32>,
    pub sentiment_lmd: Option<f64>,
    pub sentiment_harvard: Option<f64>,
    pub sentiment_vader: Option<f64>,
    pub top_topics: Vec<TopicScore>,
}

/// Split a comma-separated `place` string into `{city, state, country}`,
/// matching §4.5's event-document shape. Single-segment places are treated
/// as the city; this crate's place table never emits more than two parts.
fn split_place(place: Option<&str>) -> Value {
    let parts: Vec<String> = place
        .unwrap_or_default()
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    json!({
        "city": parts.first(),
        "state": parts.get(1),
        "country": parts.get(2),
    })
}

/// Project one video (joined with its aggregates) into an `events`-index
/// document (§4.5).
pub fn project_video(video: &Video, aggregates: &VideoAggregates) -> Value {
    let cats = [
        ModerationCategory::Harassment,
        ModerationCategory::Hate,
        ModerationCategory::SelfHarm,
        ModerationCategory::Sexual,
        ModerationCategory::Violence,
    ];
    let mut moderation = serde_json::Map::new();
    for (cat, (flag, score)) in cats.iter().zip(aggregates.moderation.iter()) {
        moderation.insert(cat.as_str().to_string(), json!({ "flag": flag, "score": score }));
    }

    let top_topics: Vec<&str> = aggregates
        .top_topics
        .iter()
        .take(5)
        .map(|(name, _)| name.as_str())
        .collect();

    json!({
        "id": video.id.to_string(),
        "video_id": video.id,
        "title": video.title,
        "date": video.date.map(|d| d.to_string()),
        "source": video.source,
        "candidate": video.candidate,
        "format": video.format,
        "record_type": video.record_type,
        "place": split_place(video.place.as_deref()),
        "topics": top_topics,
        "moderation": Value::Object(moderation),
        "stresslens": {
            "score": aggregates.stresslens_avg_score,
            "rank": aggregates.stresslens_modal_rank,
        },
        "document": {
            "speaking_time_s": aggregates.speaking_time_s,
            "sentence_count": aggregates.sentence_count,
            "word_count": aggregates.word_count,
            "duration_s": aggregates.duration_s,
            "sentiment": {
                "lmd": aggregates.sentiment_lmd,
                "harvard": aggregates.sentiment_harvard,
                "vader": aggregates.sentiment_vader,
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_defaults_to_english() {
        assert_eq!(detect_language("hi"), "en");
        assert_eq!(detect_language(""), "en");
    }

    #[test]
    fn dutch_stopwords_tip_the_fallback() {
        assert_eq!(stopword_fallback("de het een van en is dat allemaal"), "nl");
    }

    #[test]
    fn segment_url_includes_timestamp_when_present() {
        assert_eq!(
            segment_url(7, Some(42), "s1"),
            "/videos/7?t=42&segment_id=s1"
        );
        assert_eq!(segment_url(7, None, "s1"), "/videos/7?segment_id=s1");
    }

    #[test]
    fn splits_place_into_city_state_country() {
        let v = split_place(Some("Miami, Florida"));
        assert_eq!(v["city"], "Miami");
        assert_eq!(v["state"], "Florida");
        assert!(v["country"].is_null());
    }
}
