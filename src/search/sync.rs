//! Watermark-driven batched upsert into the search engine, plus index
//! initialization and suggestions seeding (C6).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::store::ContentStore;

use super::project::{TopicScore, VideoAggregates, project_segment, project_video};
use super::{IndexSettings, SearchEngine, SemanticEmbedderConfig, TaskState};

const SEGMENTS_INDEX: &str = "segments";
const EVENTS_INDEX: &str = "events";
const SUGGESTIONS_INDEX: &str = "suggestions";

const TASK_TIMEOUT: Duration = Duration::from_secs(300);
const TASK_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// One index's persisted watermark; `None` means "never synced".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Watermark {
    pub events: Option<DateTime<Utc>>,
    pub segments: Option<DateTime<Utc>>,
}

/// Read the watermark file, defaulting to "never synced" if absent.
pub async fn load_watermark(path: &Path) -> Result<Watermark> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Watermark::default()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Write the watermark atomically: write to a temp file in the same
/// directory, then rename (§6's persisted sync state contract).
pub async fn save_watermark(path: &Path, watermark: &Watermark) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    let body = serde_json::to_string_pretty(watermark)?;
    tokio::fs::write(&tmp_path, body).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

fn segments_settings() -> IndexSettings {
    IndexSettings {
        primary_key: "id".to_string(),
        searchable_attributes: vec![
            "text".to_string(),
            "speaker".to_string(),
            "topic".to_string(),
            "video_title".to_string(),
        ],
        filterable_attributes: vec![
            "speaker", "topic", "language", "date", "source", "candidate", "record_type",
            "format", "video_seconds", "moderation.*.flag", "moderation.*.score",
            "stresslens.score", "stresslens.rank", "document.*", "sentiment.*",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        sortable_attributes: vec![
            "date".to_string(),
            "video_seconds".to_string(),
            "sentiment.vader.score".to_string(),
            "sentiment.loughran.score".to_string(),
            "sentiment.harvard.score".to_string(),
        ],
        displayed_attributes: vec!["*".to_string()],
        typo_min_word_size: Some(4),
        pagination_max_total_hits: Some(10_000),
        synonyms: Vec::new(),
        stopwords: Vec::new(),
        semantic_embedder: None,
    }
}

fn events_settings() -> IndexSettings {
    IndexSettings {
        primary_key: "id".to_string(),
        searchable_attributes: vec!["title".to_string(), "topics".to_string()],
        filterable_attributes: vec![
            "source", "candidate", "format", "record_type", "place.city", "place.state",
            "place.country", "moderation.*.flag", "moderation.*.score", "stresslens.score",
            "stresslens.rank",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        sortable_attributes: vec!["date".to_string()],
        displayed_attributes: vec!["*".to_string()],
        typo_min_word_size: Some(4),
        pagination_max_total_hits: Some(10_000),
        synonyms: Vec::new(),
        stopwords: Vec::new(),
        semantic_embedder: None,
    }
}

/// Opt-in semantic embedder settings, applied to `segments` when configured
/// (§4.6's "optional semantic embedder configuration").
pub fn with_semantic_embedder(mut settings: IndexSettings, provider: &str, model: &str) -> IndexSettings {
    settings.semantic_embedder = Some(SemanticEmbedderConfig {
        provider: provider.to_string(),
        model: model.to_string(),
        document_template: "{{doc.text}} spoken by {{doc.speaker}}".to_string(),
    });
    settings
}

/// `sync --init`: declare indexes and apply settings. Idempotent.
#[instrument(skip(engine))]
pub async fn init(engine: &dyn SearchEngine, include_events: bool) -> Result<()> {
    engine.create_index(SEGMENTS_INDEX, "id").await?;
    engine.update_settings(SEGMENTS_INDEX, &segments_settings()).await?;

    engine.create_index(SUGGESTIONS_INDEX, "termId").await?;

    if include_events {
        engine.create_index(EVENTS_INDEX, "id").await?;
        engine.update_settings(EVENTS_INDEX, &events_settings()).await?;
    }

    Ok(())
}

/// One projected-and-joined segment ready for upsert, assembled by the
/// caller from Content Store rows.
pub struct SegmentJoin {
    pub segment: crate::models::TranscriptSegment,
    pub video: crate::models::Video,
    pub topics: Vec<TopicScore>,
}

/// `sync --incremental`: for the `segments` index, page through rows with
/// `updated_at > watermark`, project, and bulk-upsert until a short page
/// signals completion. The watermark only advances after every batch in the
/// run succeeds (§5's ordering guarantee #3).
#[instrument(skip(engine, store, join_fn))]
pub async fn sync_segments_incremental<F, Fut>(
    engine: &dyn SearchEngine,
    store: &ContentStore,
    watermark: Option<DateTime<Utc>>,
    batch_size: i64,
    join_fn: F,
) -> Result<DateTime<Utc>>
where
    F: Fn(Vec<crate::models::TranscriptSegment>) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<SegmentJoin>>>,
{
    let run_started_at = Utc::now();
    let mut offset = 0i64;
    let mut consecutive_failures = 0u32;

    loop {
        let rows = store.fetch_segments_since(watermark, batch_size, offset).await?;
        if rows.is_empty() {
            break;
        }
        let joined = join_fn(rows).await?;
        let documents: Vec<serde_json::Value> = joined
            .iter()
            .map(|j| project_segment(&j.segment, &j.video, &j.topics))
            .collect();
        let is_short_page = documents.len() < batch_size as usize;

        match engine.bulk_upsert(SEGMENTS_INDEX, &documents).await {
            Ok(task) => {
                let status = super::wait_for_task(engine, &task, TASK_TIMEOUT, TASK_POLL_INTERVAL).await?;
                match status.state {
                    TaskState::Succeeded => {
                        consecutive_failures = 0;
                        info!(n = documents.len(), offset, "synced segment batch");
                    }
                    TaskState::Failed => {
                        consecutive_failures += 1;
                        warn!(message = ?status.error_message, "engine rejected batch");
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            return Err(Error::engine_bad_request(
                                status.error_message.unwrap_or_default(),
                            ));
                        }
                    }
                    TaskState::Pending => unreachable!("wait_for_task never returns Pending"),
                }
            }
            Err(Error::EngineUnavailable(msg)) => {
                consecutive_failures += 1;
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(Error::engine_unavailable(msg));
                }
            }
            Err(e) => return Err(e),
        }

        if is_short_page {
            break;
        }
        offset += batch_size;
    }

    Ok(run_started_at)
}

/// `sync --incremental` for the `events` index, mirroring the segments loop
/// with video-level aggregates supplied by the caller.
#[instrument(skip(engine, videos))]
pub async fn sync_events_batch(
    engine: &dyn SearchEngine,
    videos: Vec<(crate::models::Video, VideoAggregates)>,
) -> Result<()> {
    if videos.is_empty() {
        return Ok(());
    }
    let documents: Vec<serde_json::Value> = videos
        .iter()
        .map(|(video, agg)| project_video(video, agg))
        .collect();
    let task = engine.bulk_upsert(EVENTS_INDEX, &documents).await?;
    let status = super::wait_for_task(engine, &task, TASK_TIMEOUT, TASK_POLL_INTERVAL).await?;
    if status.state == TaskState::Failed {
        return Err(Error::engine_bad_request(status.error_message.unwrap_or_default()));
    }
    Ok(())
}

/// Discriminator for a seeded suggestion term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Speaker,
    Topic,
    VideoTitle,
}

/// Seed `suggestions` with the top-N most frequent speakers, topics, and
/// recent video titles, each assigned a monotonic `termId` (§4.6).
pub async fn seed_suggestions(
    engine: &dyn SearchEngine,
    speakers: Vec<(String, i64)>,
    topics: Vec<(String, i64)>,
    recent_titles: Vec<String>,
    top_n: usize,
) -> Result<()> {
    let mut term_id = 0i64;
    let mut documents = Vec::new();

    let mut by_kind = |kind: SuggestionKind, terms: Vec<String>| {
        for term in terms.into_iter().take(top_n) {
            term_id += 1;
            documents.push(serde_json::json!({
                "termId": term_id,
                "term": term,
                "kind": kind,
            }));
        }
    };

    let mut ranked_speakers = speakers;
    ranked_speakers.sort_by(|a, b| b.1.cmp(&a.1));
    by_kind(SuggestionKind::Speaker, ranked_speakers.into_iter().map(|(s, _)| s).collect());

    let mut ranked_topics = topics;
    ranked_topics.sort_by(|a, b| b.1.cmp(&a.1));
    by_kind(SuggestionKind::Topic, ranked_topics.into_iter().map(|(t, _)| t).collect());

    by_kind(SuggestionKind::VideoTitle, recent_titles);

    if documents.is_empty() {
        return Ok(());
    }
    engine.bulk_upsert(SUGGESTIONS_INDEX, &documents).await?;
    Ok(())
}

/// Trivial helper used by the `reindex` command: project every segment from
/// scratch regardless of watermark.
pub fn group_topics_by_segment(edges: Vec<(i64, String, f64)>) -> HashMap<i64, Vec<TopicScore>> {
    let mut grouped: HashMap<i64, Vec<TopicScore>> = HashMap::new();
    for (segment_id, topic_name, score) in edges {
        grouped.entry(segment_id).or_default().push((topic_name, score));
    }
    for topics in grouped.values_mut() {
        topics.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watermark_round_trips_through_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermark.json");

        let loaded = load_watermark(&path).await.unwrap();
        assert!(loaded.segments.is_none());

        let wm = Watermark {
            events: None,
            segments: Some(Utc::now()),
        };
        save_watermark(&path, &wm).await.unwrap();
        let reloaded = load_watermark(&path).await.unwrap();
        assert_eq!(reloaded.segments, wm.segments);
    }

    #[test]
    fn groups_and_orders_topics_by_score_descending() {
        let grouped = group_topics_by_segment(vec![
            (1, "Economy".to_string(), 0.4),
            (1, "Healthcare".to_string(), 0.9),
        ]);
        let topics = &grouped[&1];
        assert_eq!(topics[0].0, "Healthcare");
    }

    #[test]
    fn segments_settings_include_every_filter_field() {
        let settings = segments_settings();
        for required in ["speaker", "topic", "moderation.*.flag", "stresslens.rank", "document.*"] {
            assert!(settings.filterable_attributes.iter().any(|a| a == required));
        }
    }
}
