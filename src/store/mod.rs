//! Relational persistence of videos, speakers, topics, segments, and
//! segment↔topic edges (C1).

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::models::{
    Dataset, ModerationCategory, SegmentType, Speaker, SourceType, Topic, TranscodingStatus,
    TranscriptSegment, Video, VideoMetadata, VideoSummary, moderation_flag,
};
use crate::parse::ParsedSegment;

/// Process-wide advisory lock key guarding startup DDL; arbitrary but fixed
/// so every process attempting migrations agrees on it.
const STARTUP_LOCK_KEY: i64 = 91_540_531;

/// Keyword-substring rule table assigning a Topic's category on first
/// creation (§4.4's topic categorization rule table).
const TOPIC_CATEGORY_RULES: &[(&str, &[&str])] = &[
    ("Economy", &["economy", "trade", "tax", "jobs", "inflation"]),
    ("Healthcare", &["health", "medicare", "medicaid", "insurance"]),
    ("Immigration", &["immigration", "border", "visa"]),
    ("Defense & Security", &["defense", "military", "security", "war"]),
    ("Environment", &["climate", "environment", "energy"]),
    ("Education", &["education", "school", "student"]),
    ("Civil Rights", &["rights", "discrimination", "equality"]),
    ("Technology", &["technology", "tech", "ai", "cyber"]),
];

fn categorize_topic(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    for (category, keywords) in TOPIC_CATEGORY_RULES {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return category;
        }
    }
    "Other"
}

/// Async Postgres-backed content store.
pub struct ContentStore {
    pool: PgPool,
}

impl ContentStore {
    /// Connect and run embedded migrations under a process-wide advisory
    /// lock so concurrent workers never race on DDL (§4.1, §5).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let store = Self::connect_without_migrations(database_url, max_connections).await?;
        Self::run_guarded_migrations(&store.pool).await?;
        Ok(store)
    }

    /// Connect without running migrations, for callers that run `migrate`
    /// as a distinct step (`--skip-migrate`, per §6).
    pub async fn connect_without_migrations(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Run the embedded migrations against an already-connected store.
    pub async fn migrate(&self) -> Result<()> {
        Self::run_guarded_migrations(&self.pool).await
    }

    async fn run_guarded_migrations(pool: &PgPool) -> Result<()> {
        let mut conn = pool.acquire().await?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(STARTUP_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        let result = sqlx::migrate!("./migrations").run(&mut *conn).await;

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(STARTUP_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        result.map_err(Error::from)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Upsert a video by its unique `filename`. Returns the row id.
    #[instrument(skip(self, metadata), fields(filename = %metadata.filename))]
    pub async fn upsert_video(
        &self,
        metadata: &VideoMetadata,
        dataset: Dataset,
        source_type: SourceType,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO videos (
                filename, title, date, source, channel, description, url,
                format, candidate, place, record_type, dataset, source_type,
                video_thumbnail_url, video_url, vimeo_video_id, vimeo_embed_url,
                updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17, now())
            ON CONFLICT (filename) DO UPDATE SET
                title = EXCLUDED.title,
                date = EXCLUDED.date,
                source = EXCLUDED.source,
                channel = EXCLUDED.channel,
                description = EXCLUDED.description,
                url = EXCLUDED.url,
                format = EXCLUDED.format,
                candidate = EXCLUDED.candidate,
                place = EXCLUDED.place,
                record_type = EXCLUDED.record_type,
                video_thumbnail_url = EXCLUDED.video_thumbnail_url,
                video_url = EXCLUDED.video_url,
                vimeo_video_id = EXCLUDED.vimeo_video_id,
                vimeo_embed_url = EXCLUDED.vimeo_embed_url,
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(&metadata.filename)
        .bind(&metadata.title)
        .bind(metadata.date)
        .bind(&metadata.source)
        .bind(&metadata.channel)
        .bind(&metadata.description)
        .bind(&metadata.url)
        .bind(&metadata.format)
        .bind(&metadata.candidate)
        .bind(&metadata.place)
        .bind(&metadata.record_type)
        .bind(dataset_str(dataset))
        .bind(source_type_str(source_type))
        .bind(&metadata.video_thumbnail_url)
        .bind(&metadata.video_url)
        .bind(&metadata.vimeo_video_id)
        .bind(&metadata.vimeo_embed_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    /// Look up a video's id by filename, if it already exists.
    pub async fn find_video_id_by_filename(&self, filename: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT id FROM videos WHERE filename = $1")
            .bind(filename)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    /// Replace all of a video's segments transactionally: explicit `DELETE`
    /// then bulk insert, with per-job speaker/topic caches resolved inline.
    /// Never a `SELECT`-then-skip — see DESIGN.md's Open Question (c).
    #[instrument(skip(self, segments), fields(video_id, n = segments.len()))]
    pub async fn replace_segments(
        &self,
        video_id: i64,
        segments: &[ParsedSegment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM segments WHERE video_id = $1")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

        let mut total_words: i64 = 0;
        let mut total_characters: i64 = 0;

        for segment in segments {
            let speaker_id = match &segment.speaker_name {
                Some(name) if !name.trim().is_empty() => {
                    Some(get_or_create_speaker_tx(&mut *tx, name, segment.speaker_party.as_deref()).await?)
                }
                _ => None,
            };

            let harassment_flag = moderation_flag(segment.moderation_harassment);
            let hate_flag = moderation_flag(segment.moderation_hate);
            let self_harm_flag = moderation_flag(segment.moderation_self_harm);
            let sexual_flag = moderation_flag(segment.moderation_sexual);
            let violence_flag = moderation_flag(segment.moderation_violence);

            let row = sqlx::query(
                r#"
                INSERT INTO segments (
                    segment_id, video_id, speaker_id, speaker_name, speaker_party,
                    segment_type, transcript_text, video_seconds, timestamp_start,
                    timestamp_end, duration_seconds, word_count, char_count,
                    sentiment_loughran_score, sentiment_loughran_label,
                    sentiment_harvard_score, sentiment_harvard_label,
                    sentiment_vader_score, sentiment_vader_label,
                    moderation_harassment, moderation_hate, moderation_self_harm,
                    moderation_sexual, moderation_violence, moderation_overall_score,
                    moderation_harassment_flag, moderation_hate_flag,
                    moderation_self_harm_flag, moderation_sexual_flag, moderation_violence_flag,
                    flesch_kincaid_grade, gunning_fog_index, coleman_liau_index,
                    automated_readability_index, smog_index, flesch_reading_ease,
                    stresslens_score, stresslens_rank
                ) VALUES (
                    $1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,
                    $20,$21,$22,$23,$24,$25,$26,$27,$28,$29,$30,$31,$32,$33,$34,$35,$36,$37,$38
                )
                RETURNING id
                "#,
            )
            .bind(&segment.segment_id)
            .bind(video_id)
            .bind(speaker_id)
            .bind(&segment.speaker_name)
            .bind(&segment.speaker_party)
            .bind(segment_type_str(segment.segment_type))
            .bind(&segment.transcript_text)
            .bind(segment.video_seconds)
            .bind(&segment.timestamp_start)
            .bind(&segment.timestamp_end)
            .bind(segment.duration_seconds)
            .bind(segment.word_count)
            .bind(segment.char_count)
            .bind(segment.sentiment_loughran_score)
            .bind(&segment.sentiment_loughran_label)
            .bind(segment.sentiment_harvard_score)
            .bind(&segment.sentiment_harvard_label)
            .bind(segment.sentiment_vader_score)
            .bind(&segment.sentiment_vader_label)
            .bind(segment.moderation_harassment)
            .bind(segment.moderation_hate)
            .bind(segment.moderation_self_harm)
            .bind(segment.moderation_sexual)
            .bind(segment.moderation_violence)
            .bind(segment.moderation_overall_score)
            .bind(harassment_flag)
            .bind(hate_flag)
            .bind(self_harm_flag)
            .bind(sexual_flag)
            .bind(violence_flag)
            .bind(segment.flesch_kincaid_grade)
            .bind(segment.gunning_fog_index)
            .bind(segment.coleman_liau_index)
            .bind(segment.automated_readability_index)
            .bind(segment.smog_index)
            .bind(segment.flesch_reading_ease)
            .bind(segment.stresslens_score)
            .bind(segment.stresslens_rank)
            .fetch_one(&mut *tx)
            .await?;

            let segment_row_id: i64 = row.get("id");

            if let Some(topic_name) = &segment.primary_topic {
                if !topic_name.trim().is_empty() {
                    let topic_id = get_or_create_topic_tx(&mut *tx, topic_name).await?;
                    sqlx::query(
                        "INSERT INTO segment_topics (segment_id, topic_id, score) VALUES ($1, $2, $3)",
                    )
                    .bind(segment_row_id)
                    .bind(topic_id)
                    .bind(1.0_f64)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            total_words += segment.word_count as i64;
            total_characters += segment.char_count as i64;
        }

        sqlx::query(
            "UPDATE videos SET total_words = $2, total_characters = $3, total_segments = $4, updated_at = now() WHERE id = $1",
        )
        .bind(video_id)
        .bind(total_words)
        .bind(total_characters)
        .bind(segments.len() as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Resolve a speaker by normalized name, creating it on first sighting.
    /// On a unique-key race with another worker, roll back to savepoint and
    /// reread per §4.4.
    pub async fn get_or_create_speaker(&self, name: &str) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        get_or_create_speaker_tx(&mut conn, name, None).await
    }

    pub async fn get_or_create_topic(&self, name: &str) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        get_or_create_topic_tx(&mut conn, name).await
    }

    /// Page through segments with `updated_at > watermark`, ordered by id,
    /// for the Sync Engine's incremental loop (§4.6).
    pub async fn fetch_segments_since(
        &self,
        watermark: Option<DateTime<Utc>>,
        batch_size: i64,
        offset: i64,
    ) -> Result<Vec<TranscriptSegment>> {
        let rows = sqlx::query_as::<_, SegmentRow>(
            r#"
            SELECT * FROM segments
            WHERE ($1::timestamptz IS NULL OR updated_at > $1)
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(watermark)
        .bind(batch_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn fetch_video(&self, video_id: i64) -> Result<Option<Video>> {
        let row = sqlx::query_as::<_, VideoRow>("SELECT * FROM videos WHERE id = $1")
            .bind(video_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// Delete a video; cascades to its segments and segment-topics, never to
    /// shared speakers or topics (§3's invariant).
    pub async fn delete_video(&self, video_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_dataset(&self, dataset: Dataset, source_type: Option<SourceType>) -> Result<u64> {
        let result = match source_type {
            Some(st) => {
                sqlx::query("DELETE FROM videos WHERE dataset = $1 AND source_type = $2")
                    .bind(dataset_str(dataset))
                    .bind(source_type_str(st))
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM videos WHERE dataset = $1")
                    .bind(dataset_str(dataset))
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }

    /// Recompute derived speaker aggregates; run once per ingest job, not
    /// per file (§4.4).
    pub async fn recompute_speaker_stats(&self) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE speakers s SET
                total_segments = agg.cnt,
                total_words = agg.words,
                avg_sentiment = agg.avg_sentiment
            FROM (
                SELECT speaker_id, COUNT(*) AS cnt, COALESCE(SUM(word_count), 0) AS words,
                       AVG(sentiment_vader_score) AS avg_sentiment
                FROM segments
                WHERE speaker_id IS NOT NULL
                GROUP BY speaker_id
            ) AS agg
            WHERE s.id = agg.speaker_id
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recompute_topic_stats(&self) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE topics t SET
                total_segments = agg.cnt,
                avg_score = agg.avg_score
            FROM (
                SELECT topic_id, COUNT(*) AS cnt, AVG(score) AS avg_score
                FROM segment_topics
                GROUP BY topic_id
            ) AS agg
            WHERE t.id = agg.topic_id
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Trigram/ILIKE fallback search used by the Query Translator when the
    /// engine is unreachable (§4.7's SQL fallback path, `exact` mode).
    pub async fn search_segments_ilike(&self, query: &str, limit: i64) -> Result<Vec<TranscriptSegment>> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let rows = sqlx::query_as::<_, SegmentRow>(
            "SELECT * FROM segments WHERE transcript_text ILIKE $1 ORDER BY updated_at DESC LIMIT $2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Full-text tsvector fallback (`fulltext` mode).
    pub async fn search_segments_fulltext(&self, query: &str, limit: i64) -> Result<Vec<TranscriptSegment>> {
        let rows = sqlx::query_as::<_, SegmentRow>(
            r#"
            SELECT * FROM segments
            WHERE to_tsvector('english', transcript_text) @@ plainto_tsquery('english', $1)
            ORDER BY updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Trigram-similarity fallback (`fuzzy` mode), thresholded at 0.3.
    pub async fn search_segments_fuzzy(&self, query: &str, limit: i64) -> Result<Vec<TranscriptSegment>> {
        let rows = sqlx::query_as::<_, SegmentRow>(
            r#"
            SELECT * FROM segments
            WHERE similarity(transcript_text, $1) > 0.3
            ORDER BY similarity(transcript_text, $1) DESC
            LIMIT $2
            "#,
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// §10.4: read-through cache for a pre-computed video summary. Never
    /// generates one — that would be chatbot/LLM proxying, out of scope.
    pub async fn get_cached_summary(&self, video_id: i64, preset: &str) -> Result<Option<VideoSummary>> {
        let row = sqlx::query_as::<_, VideoSummaryRow>(
            "SELECT * FROM video_summaries WHERE video_id = $1 AND preset = $2",
        )
        .bind(video_id)
        .bind(preset)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn put_cached_summary(&self, summary: &VideoSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO video_summaries (video_id, preset, text, model, generated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (video_id, preset) DO UPDATE SET
                text = EXCLUDED.text, model = EXCLUDED.model, generated_at = EXCLUDED.generated_at
            "#,
        )
        .bind(summary.video_id)
        .bind(&summary.preset)
        .bind(&summary.text)
        .bind(&summary.model)
        .bind(summary.generated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn get_or_create_speaker_tx(executor: &mut sqlx::PgConnection, name: &str, party: Option<&str>) -> Result<i64> {
    let normalized = Speaker::normalize(name);

    if let Some(row) = sqlx::query("SELECT id FROM speakers WHERE normalized_name = $1")
        .bind(&normalized)
        .fetch_optional(&mut *executor)
        .await?
    {
        return Ok(row.get("id"));
    }

    match sqlx::query(
        "INSERT INTO speakers (name, normalized_name, party) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(&normalized)
    .bind(party)
    .fetch_one(&mut *executor)
    .await
    {
        Ok(row) => Ok(row.get("id")),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            // Another worker won the race; reread per §4.4's conflict protocol.
            let row = sqlx::query("SELECT id FROM speakers WHERE normalized_name = $1")
                .bind(&normalized)
                .fetch_one(&mut *executor)
                .await?;
            Ok(row.get("id"))
        }
        Err(e) => Err(e.into()),
    }
}

async fn get_or_create_topic_tx(executor: &mut sqlx::PgConnection, name: &str) -> Result<i64> {
    if let Some(row) = sqlx::query("SELECT id FROM topics WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *executor)
        .await?
    {
        return Ok(row.get("id"));
    }

    let category = categorize_topic(name);

    match sqlx::query("INSERT INTO topics (name, category) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(category)
        .fetch_one(&mut *executor)
        .await
    {
        Ok(row) => Ok(row.get("id")),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            let row = sqlx::query("SELECT id FROM topics WHERE name = $1")
                .bind(name)
                .fetch_one(&mut *executor)
                .await?;
            Ok(row.get("id"))
        }
        Err(e) => Err(e.into()),
    }
}

fn dataset_str(d: Dataset) -> &'static str {
    match d {
        Dataset::Trump => "trump",
        Dataset::TweedeKamer => "tweede_kamer",
        Dataset::VideoLibrary => "video_library",
    }
}

fn source_type_str(s: SourceType) -> &'static str {
    match s {
        SourceType::Html => "html",
        SourceType::Xml => "xml",
        SourceType::VideoFile => "video_file",
    }
}

fn segment_type_str(s: SegmentType) -> &'static str {
    match s {
        SegmentType::Spoken => "spoken",
        SegmentType::Announcement => "announcement",
    }
}

#[derive(sqlx::FromRow)]
struct SegmentRow {
    id: i64,
    segment_id: String,
    video_id: i64,
    speaker_id: Option<i64>,
    speaker_name: Option<String>,
    speaker_party: Option<String>,
    segment_type: String,
    transcript_text: String,
    video_seconds: Option<i32>,
    timestamp_start: Option<String>,
    timestamp_end: Option<String>,
    duration_seconds: Option<i32>,
    word_count: i32,
    char_count: i32,
    sentiment_loughran_score: Option<f64>,
    sentiment_loughran_label: Option<String>,
    sentiment_harvard_score: Option<f64>,
    sentiment_harvard_label: Option<String>,
    sentiment_vader_score: Option<f64>,
    sentiment_vader_label: Option<String>,
    moderation_harassment: Option<f64>,
    moderation_hate: Option<f64>,
    moderation_self_harm: Option<f64>,
    moderation_sexual: Option<f64>,
    moderation_violence: Option<f64>,
    moderation_overall_score: Option<f64>,
    moderation_harassment_flag: bool,
    moderation_hate_flag: bool,
    moderation_self_harm_flag: bool,
    moderation_sexual_flag: bool,
    moderation_violence_flag: bool,
    flesch_kincaid_grade: Option<f64>,
    gunning_fog_index: Option<f64>,
    coleman_liau_index: Option<f64>,
    automated_readability_index: Option<f64>,
    smog_index: Option<f64>,
    flesch_reading_ease: Option<f64>,
    stresslens_score: Option<f64>,
    stresslens_rank: Option<i16>,
    embedding: Option<String>,
    embedding_generated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SegmentRow> for TranscriptSegment {
    fn from(r: SegmentRow) -> Self {
        TranscriptSegment {
            id: r.id,
            segment_id: r.segment_id,
            video_id: r.video_id,
            speaker_id: r.speaker_id,
            speaker_name: r.speaker_name,
            speaker_party: r.speaker_party,
            segment_type: if r.segment_type == "announcement" {
                SegmentType::Announcement
            } else {
                SegmentType::Spoken
            },
            transcript_text: r.transcript_text,
            video_seconds: r.video_seconds,
            timestamp_start: r.timestamp_start,
            timestamp_end: r.timestamp_end,
            duration_seconds: r.duration_seconds,
            word_count: r.word_count,
            char_count: r.char_count,
            sentiment_loughran_score: r.sentiment_loughran_score,
            sentiment_loughran_label: r.sentiment_loughran_label,
            sentiment_harvard_score: r.sentiment_harvard_score,
            sentiment_harvard_label: r.sentiment_harvard_label,
            sentiment_vader_score: r.sentiment_vader_score,
            sentiment_vader_label: r.sentiment_vader_label,
            moderation_harassment: r.moderation_harassment,
            moderation_hate: r.moderation_hate,
            moderation_self_harm: r.moderation_self_harm,
            moderation_sexual: r.moderation_sexual,
            moderation_violence: r.moderation_violence,
            moderation_overall_score: r.moderation_overall_score,
            moderation_harassment_flag: r.moderation_harassment_flag,
            moderation_hate_flag: r.moderation_hate_flag,
            moderation_self_harm_flag: r.moderation_self_harm_flag,
            moderation_sexual_flag: r.moderation_sexual_flag,
            moderation_violence_flag: r.moderation_violence_flag,
            flesch_kincaid_grade: r.flesch_kincaid_grade,
            gunning_fog_index: r.gunning_fog_index,
            coleman_liau_index: r.coleman_liau_index,
            automated_readability_index: r.automated_readability_index,
            smog_index: r.smog_index,
            flesch_reading_ease: r.flesch_reading_ease,
            stresslens_score: r.stresslens_score,
            stresslens_rank: r.stresslens_rank,
            embedding: r.embedding,
            embedding_generated_at: r.embedding_generated_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VideoRow {
    id: i64,
    filename: String,
    title: String,
    date: Option<chrono::NaiveDate>,
    duration_seconds: Option<i32>,
    source: Option<String>,
    channel: Option<String>,
    description: Option<String>,
    url: Option<String>,
    format: Option<String>,
    candidate: Option<String>,
    place: Option<String>,
    record_type: Option<String>,
    dataset: String,
    source_type: String,
    video_thumbnail_url: Option<String>,
    video_url: Option<String>,
    vimeo_video_id: Option<String>,
    vimeo_embed_url: Option<String>,
    total_words: i64,
    total_characters: i64,
    total_segments: i64,
    video_file_path: Option<String>,
    srt_file_path: Option<String>,
    video_format: Option<String>,
    video_file_size: Option<i64>,
    video_duration_seconds: Option<i32>,
    video_resolution: Option<String>,
    video_fps: Option<f32>,
    video_bitrate: Option<i32>,
    transcoding_status: Option<String>,
    transcoded_file_path: Option<String>,
    transcoding_started_at: Option<DateTime<Utc>>,
    transcoding_completed_at: Option<DateTime<Utc>>,
    transcoding_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<VideoRow> for Video {
    fn from(r: VideoRow) -> Self {
        Video {
            id: r.id,
            filename: r.filename,
            title: r.title,
            date: r.date,
            duration_seconds: r.duration_seconds,
            source: r.source,
            channel: r.channel,
            description: r.description,
            url: r.url,
            format: r.format,
            candidate: r.candidate,
            place: r.place,
            record_type: r.record_type,
            dataset: match r.dataset.as_str() {
                "tweede_kamer" => Dataset::TweedeKamer,
                "video_library" => Dataset::VideoLibrary,
                _ => Dataset::Trump,
            },
            source_type: match r.source_type.as_str() {
                "xml" => SourceType::Xml,
                "video_file" => SourceType::VideoFile,
                _ => SourceType::Html,
            },
            video_thumbnail_url: r.video_thumbnail_url,
            video_url: r.video_url,
            vimeo_video_id: r.vimeo_video_id,
            vimeo_embed_url: r.vimeo_embed_url,
            total_words: r.total_words,
            total_characters: r.total_characters,
            total_segments: r.total_segments,
            video_file_path: r.video_file_path,
            srt_file_path: r.srt_file_path,
            video_format: r.video_format,
            video_file_size: r.video_file_size,
            video_duration_seconds: r.video_duration_seconds,
            video_resolution: r.video_resolution,
            video_fps: r.video_fps,
            video_bitrate: r.video_bitrate,
            transcoding_status: r.transcoding_status.and_then(|s| match s.as_str() {
                "pending" => Some(TranscodingStatus::Pending),
                "processing" => Some(TranscodingStatus::Processing),
                "completed" => Some(TranscodingStatus::Completed),
                "failed" => Some(TranscodingStatus::Failed),
                _ => None,
            }),
            transcoded_file_path: r.transcoded_file_path,
            transcoding_started_at: r.transcoding_started_at,
            transcoding_completed_at: r.transcoding_completed_at,
            transcoding_error: r.transcoding_error,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VideoSummaryRow {
    video_id: i64,
    preset: String,
    text: String,
    model: String,
    generated_at: DateTime<Utc>,
}

impl From<VideoSummaryRow> for VideoSummary {
    fn from(r: VideoSummaryRow) -> Self {
        VideoSummary {
            video_id: r.video_id,
            preset: r.preset,
            text: r.text,
            model: r.model,
            generated_at: r.generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_topics_by_keyword() {
        assert_eq!(categorize_topic("Border Security Policy"), "Immigration");
        assert_eq!(categorize_topic("Tax Reform"), "Economy");
        assert_eq!(categorize_topic("Random Thing"), "Other");
    }

    #[test]
    fn moderation_category_names_match_column_suffixes() {
        for cat in ModerationCategory::ALL {
            assert!(!cat.as_str().is_empty());
        }
    }
}
