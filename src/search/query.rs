//! Filter DSL → engine filter string translation and query dispatch (C7).

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::Result;
use crate::models::ModerationCategory;
use crate::store::ContentStore;

use super::{SearchEngine, SearchMode, SearchRequest, SearchResponse};

/// Every filter parameter named in §4.7's grammar table. All fields optional;
/// an absent field contributes no clause.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub format: Option<String>,
    pub source: Option<String>,
    pub candidate: Option<String>,
    pub record_type: Option<String>,
    pub place: Option<String>,
    pub topic: Option<String>,
    pub min_topic_score: Option<f64>,
    pub moderation_flags: Vec<ModerationCategory>,
    pub moderation_min_scores: Vec<(ModerationCategory, f64)>,
    pub min_stresslens: Option<f64>,
    pub max_stresslens: Option<f64>,
    pub stresslens_rank: Option<i16>,
    pub min_speaking_time_s: Option<i64>,
    pub max_speaking_time_s: Option<i64>,
    pub min_sentence_count: Option<i64>,
    pub max_sentence_count: Option<i64>,
    pub min_word_count: Option<i64>,
    pub max_word_count: Option<i64>,
    pub min_duration_s: Option<i64>,
    pub max_duration_s: Option<i64>,
    pub min_sentiment_lmd: Option<f64>,
    pub max_sentiment_lmd: Option<f64>,
    pub min_sentiment_harvard: Option<f64>,
    pub max_sentiment_harvard: Option<f64>,
    pub min_sentiment_vader: Option<f64>,
    pub max_sentiment_vader: Option<f64>,
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// Pure translation of a [`FilterSpec`] into the engine's conjunctive filter
/// string, per §4.7's grammar table. Clauses are joined with ` AND `;
/// absent fields contribute nothing.
pub fn translate(spec: &FilterSpec) -> Option<String> {
    let mut clauses = Vec::new();

    if let Some(v) = &spec.date_from {
        clauses.push(format!("date >= {}", quote(v)));
    }
    if let Some(v) = &spec.date_to {
        clauses.push(format!("date <= {}", quote(v)));
    }
    if let Some(v) = &spec.format {
        clauses.push(format!("format = {}", quote(v)));
    }
    if let Some(v) = &spec.source {
        clauses.push(format!("source = {}", quote(v)));
    }
    if let Some(v) = &spec.candidate {
        clauses.push(format!("candidate = {}", quote(v)));
    }
    if let Some(v) = &spec.record_type {
        clauses.push(format!("record_type = {}", quote(v)));
    }
    if let Some(v) = &spec.place {
        let parts: Vec<&str> = v.split(',').map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
        let fields = ["place.city", "place.state", "place.country"];
        for (field, part) in fields.iter().zip(parts.iter()) {
            clauses.push(format!("{field} = {}", quote(part)));
        }
    }
    if let Some(v) = &spec.topic {
        clauses.push(format!("topics.topic = {}", quote(v)));
    }
    if let Some(v) = spec.min_topic_score {
        clauses.push(format!("topics.score >= {v}"));
    }
    for cat in &spec.moderation_flags {
        clauses.push(format!("moderation.{}.flag = true", cat.as_str()));
    }
    for (cat, min) in &spec.moderation_min_scores {
        clauses.push(format!("moderation.{}.score >= {min}", cat.as_str()));
    }
    if let Some(v) = spec.min_stresslens {
        clauses.push(format!("stresslens.score >= {v}"));
    }
    if let Some(v) = spec.max_stresslens {
        clauses.push(format!("stresslens.score <= {v}"));
    }
    if let Some(v) = spec.stresslens_rank {
        clauses.push(format!("stresslens.rank = {v}"));
    }
    range_clause(&mut clauses, "document.speaking_time_s", spec.min_speaking_time_s, spec.max_speaking_time_s);
    range_clause(&mut clauses, "document.sentence_count", spec.min_sentence_count, spec.max_sentence_count);
    range_clause(&mut clauses, "document.word_count", spec.min_word_count, spec.max_word_count);
    range_clause(&mut clauses, "document.duration_s", spec.min_duration_s, spec.max_duration_s);
    float_range_clause(&mut clauses, "document.sentiment.lmd", spec.min_sentiment_lmd, spec.max_sentiment_lmd);
    float_range_clause(&mut clauses, "document.sentiment.harvard", spec.min_sentiment_harvard, spec.max_sentiment_harvard);
    float_range_clause(&mut clauses, "document.sentiment.vader", spec.min_sentiment_vader, spec.max_sentiment_vader);

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}

fn range_clause(clauses: &mut Vec<String>, field: &str, min: Option<i64>, max: Option<i64>) {
    if let Some(v) = min {
        clauses.push(format!("{field} >= {v}"));
    }
    if let Some(v) = max {
        clauses.push(format!("{field} <= {v}"));
    }
}

fn float_range_clause(clauses: &mut Vec<String>, field: &str, min: Option<f64>, max: Option<f64>) {
    if let Some(v) = min {
        clauses.push(format!("{field} >= {v}"));
    }
    if let Some(v) = max {
        clauses.push(format!("{field} <= {v}"));
    }
}

/// Default hybrid-mode semantic ratio when the caller doesn't override it.
pub const DEFAULT_HYBRID_RATIO: f32 = 0.5;

fn hybrid_ratio_for(mode: SearchMode, configured_default: f32) -> f32 {
    match mode {
        SearchMode::Lexical => 0.0,
        SearchMode::Semantic => 1.0,
        SearchMode::Hybrid => configured_default,
    }
}

/// Engine index targeted by a query (§4.7's `index` param).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIndex {
    Segments,
    Events,
}

impl QueryIndex {
    fn as_str(self) -> &'static str {
        match self {
            QueryIndex::Segments => "segments",
            QueryIndex::Events => "events",
        }
    }
}

/// Dispatches queries to the engine, falling back to a SQL-level search
/// against the Content Store when the engine is unreachable (§4.7).
pub struct QueryTranslator {
    engine: Arc<dyn SearchEngine>,
    store: Arc<ContentStore>,
    hybrid_ratio_default: f32,
}

impl QueryTranslator {
    pub fn new(engine: Arc<dyn SearchEngine>, store: Arc<ContentStore>, hybrid_ratio_default: f32) -> Self {
        Self {
            engine,
            store,
            hybrid_ratio_default,
        }
    }

    pub async fn search(
        &self,
        index: QueryIndex,
        query: &str,
        filter: &FilterSpec,
        mode: SearchMode,
        page: u32,
        page_size: u32,
        locales: Vec<String>,
    ) -> Result<SearchResponse> {
        let request = SearchRequest {
            query: query.to_string(),
            filter: translate(filter),
            page,
            page_size,
            mode,
            hybrid_ratio: hybrid_ratio_for(mode, self.hybrid_ratio_default),
            locales,
        };

        match self.engine.search(index.as_str(), &request).await {
            Ok(mut response) => {
                normalize_hits(&mut response);
                Ok(response)
            }
            Err(crate::error::Error::EngineUnavailable(_)) => self.sql_fallback(query).await,
            Err(e) => Err(e),
        }
    }

    async fn sql_fallback(&self, query: &str) -> Result<SearchResponse> {
        let segments = self.store.search_segments_ilike(query, 50).await?;
        let hits = segments
            .into_iter()
            .map(|seg| {
                serde_json::json!({
                    "id": seg.id.to_string(),
                    "videoId": seg.video_id,
                    "text": seg.transcript_text,
                    "speaker": seg.speaker_name,
                    "segment_url": super::project::segment_url(seg.video_id, seg.video_seconds, &seg.segment_id),
                })
            })
            .collect::<Vec<_>>();
        Ok(SearchResponse {
            estimated_total_hits: hits.len() as u64,
            hits,
        })
    }

    /// `similar_segments(id, limit)`: try the engine's native endpoint first;
    /// on failure or empty support, fall back to a hybrid search seeded with
    /// the source document's own text, filtering the source id out.
    pub async fn similar_segments(&self, id: &str, limit: u32) -> Result<SearchResponse> {
        if let Ok(Some(response)) = self.engine.similar_documents("segments", id, limit).await {
            if !response.hits.is_empty() {
                return Ok(response);
            }
        }

        let source_text = self
            .engine
            .search(
                "segments",
                &SearchRequest {
                    query: String::new(),
                    filter: Some(format!("id = \"{id}\"")),
                    page: 1,
                    page_size: 1,
                    mode: SearchMode::Lexical,
                    hybrid_ratio: 0.0,
                    locales: Vec::new(),
                },
            )
            .await
            .ok()
            .and_then(|r| r.hits.into_iter().next())
            .and_then(|doc| doc.get("text").and_then(|t| t.as_str()).map(|s| s.to_string()))
            .unwrap_or_default();

        let seed: String = source_text.chars().take(500).collect();

        let mut response = self
            .engine
            .search(
                "segments",
                &SearchRequest {
                    query: seed,
                    filter: None,
                    page: 1,
                    page_size: limit + 1,
                    mode: SearchMode::Hybrid,
                    hybrid_ratio: self.hybrid_ratio_default,
                    locales: Vec::new(),
                },
            )
            .await?;

        response.hits.retain(|doc| doc.get("id").and_then(|v| v.as_str()) != Some(id));
        response.hits.truncate(limit as usize);
        normalize_hits(&mut response);
        Ok(response)
    }
}

/// Fill missing fields with `null` and compute `moderation.overall_score` as
/// the max of the five category scores when absent, per §4.7's result
/// mapping so downstream consumers are polymorphic across segment/event
/// shapes.
fn normalize_hits(response: &mut SearchResponse) {
    for hit in &mut response.hits {
        let obj = match hit.as_object_mut() {
            Some(o) => o,
            None => continue,
        };
        for field in [
            "speaker", "topic", "language", "date", "video_seconds", "segment_url",
            "video_title", "source", "candidate", "record_type", "format",
        ] {
            obj.entry(field).or_insert(Value::Null);
        }

        if let Some(moderation) = obj.get_mut("moderation").and_then(|m| m.as_object_mut()) {
            if !moderation.contains_key("overall_score") {
                let max_score = moderation
                    .values()
                    .filter_map(|v| v.get("score"))
                    .filter_map(|s| s.as_f64())
                    .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));
                moderation.insert("overall_score".to_string(), serde_json::json!(max_score));
            }
        }
    }
}

pub fn wait_timeout_default() -> Duration {
    Duration::from_secs(300)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_spec_yields_no_filter() {
        assert_eq!(translate(&FilterSpec::default()), None);
    }

    #[test]
    fn filter_translation_matches_scenario_five() {
        let spec = FilterSpec {
            format: Some("Political Rally".to_string()),
            moderation_flags: vec![ModerationCategory::Hate],
            min_stresslens: Some(0.7),
            ..Default::default()
        };
        assert_eq!(
            translate(&spec).unwrap(),
            "format = \"Political Rally\" AND moderation.hate.flag = true AND stresslens.score >= 0.7"
        );
    }

    #[test]
    fn place_splits_into_city_state_country_clauses() {
        let spec = FilterSpec {
            place: Some("Miami, Florida".to_string()),
            ..Default::default()
        };
        assert_eq!(
            translate(&spec).unwrap(),
            "place.city = \"Miami\" AND place.state = \"Florida\""
        );
    }

    #[test]
    fn hybrid_ratio_follows_mode() {
        assert_eq!(hybrid_ratio_for(SearchMode::Lexical, 0.6), 0.0);
        assert_eq!(hybrid_ratio_for(SearchMode::Semantic, 0.6), 1.0);
        assert_eq!(hybrid_ratio_for(SearchMode::Hybrid, 0.6), 0.6);
    }
}
