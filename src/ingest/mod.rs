//! Walks a directory of transcript files and loads them into the content
//! store under a bounded worker pool (C4).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{instrument, warn};

use crate::error::Result;
use crate::models::{Dataset, SourceType};
use crate::parse::{self, ParsedVideo};
use crate::progress::ProgressBus;
use crate::store::ContentStore;

/// Bounds on the concurrent-worker knob (§4.4).
pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 10;
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub dataset: Dataset,
    pub source_type: SourceType,
    pub force_reimport: bool,
    pub concurrency: usize,
}

impl IngestOptions {
    pub fn clamp_concurrency(mut self) -> Self {
        self.concurrency = self.concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        self
    }
}

/// Outcome of one file's ingest attempt.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub error: Option<String>,
}

/// Summary of a whole ingest job, returned to the CLI and mirrored on the
/// progress bus.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

fn extension_for(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::Html => "html",
        SourceType::Xml => "xml",
        SourceType::VideoFile => "",
    }
}

fn enumerate_files(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn parse_file(source_type: SourceType, filename: &str, content: &str) -> ParsedVideo {
    match source_type {
        SourceType::Html => parse::html::parse(filename, content),
        SourceType::Xml => parse::vlos::parse(filename, content),
        SourceType::VideoFile => ParsedVideo::default(),
    }
}

/// Ingest every matching file under `dir`, bounded by
/// `options.concurrency` concurrent workers.
#[instrument(skip(store, progress, options), fields(dir = %dir.display()))]
pub async fn ingest_directory(
    store: Arc<ContentStore>,
    progress: Arc<ProgressBus>,
    dir: &Path,
    options: IngestOptions,
) -> Result<IngestSummary> {
    let options = options.clamp_concurrency();
    let extension = extension_for(options.source_type);
    let files = enumerate_files(dir, extension)?;

    let job_id = next_job_id();
    progress.start_job(&job_id, files.len());

    let semaphore = Arc::new(Semaphore::new(options.concurrency));
    let mut handles = Vec::with_capacity(files.len());

    for path in files.iter().cloned() {
        let store = Arc::clone(&store);
        let progress = Arc::clone(&progress);
        let semaphore = Arc::clone(&semaphore);
        let options = options.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            let outcome = ingest_one_file(&store, &path, &options).await;
            match &outcome.error {
                Some(msg) => progress.record_failure(&path.display().to_string(), msg),
                None => progress.record_processed(&path.display().to_string()),
            }
            outcome
        }));
    }

    let mut summary = IngestSummary {
        total: files.len(),
        ..Default::default()
    };

    for handle in handles {
        match handle.await {
            Ok(outcome) => match outcome.error {
                Some(msg) => {
                    summary.failed += 1;
                    summary
                        .errors
                        .push(format!("{}: {msg}", outcome.path.display()));
                }
                None => summary.processed += 1,
            },
            Err(join_err) => {
                summary.failed += 1;
                summary.errors.push(format!("worker panicked: {join_err}"));
            }
        }
    }

    if summary.processed > 0 {
        if let Err(e) = store.recompute_speaker_stats().await {
            warn!(error = %e, "failed to recompute speaker stats after ingest");
        }
        if let Err(e) = store.recompute_topic_stats().await {
            warn!(error = %e, "failed to recompute topic stats after ingest");
        }
    }

    let final_status = if summary.failed == 0 {
        crate::progress::JobStatus::Completed
    } else {
        crate::progress::JobStatus::Failed
    };
    progress.finish_job(final_status);
    Ok(summary)
}

async fn ingest_one_file(
    store: &ContentStore,
    path: &Path,
    options: &IngestOptions,
) -> FileOutcome {
    let result = ingest_one_file_inner(store, path, options).await;
    FileOutcome {
        path: path.to_path_buf(),
        error: result.err().map(|e| e.to_string()),
    }
}

async fn ingest_one_file_inner(
    store: &ContentStore,
    path: &Path,
    options: &IngestOptions,
) -> Result<()> {
    let filename = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or_default()
        .to_string();

    if !options.force_reimport && store.find_video_id_by_filename(&filename).await?.is_some() {
        return Ok(());
    }

    let content = tokio::fs::read_to_string(path).await?;
    let parsed = parse_file(options.source_type, &filename, &content);

    for warning in &parsed.warnings {
        warn!(context = %warning.context, message = %warning.message, file = %filename, "parse warning");
    }

    if parsed.segments.is_empty() {
        return Err(crate::error::Error::NoSegments);
    }

    let video_id = store
        .upsert_video(&parsed.metadata, options.dataset, options.source_type)
        .await?;
    store.replace_segments(video_id, &parsed.segments).await?;

    Ok(())
}

/// A process-unique job id without pulling in a UUID crate for a value
/// that's only ever compared for equality within one run.
fn next_job_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("job-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_concurrency_to_bounds() {
        let opts = IngestOptions {
            dataset: Dataset::Trump,
            source_type: SourceType::Html,
            force_reimport: false,
            concurrency: 99,
        }
        .clamp_concurrency();
        assert_eq!(opts.concurrency, MAX_CONCURRENCY);

        let opts = IngestOptions {
            dataset: Dataset::Trump,
            source_type: SourceType::Html,
            force_reimport: false,
            concurrency: 0,
        }
        .clamp_concurrency();
        assert_eq!(opts.concurrency, MIN_CONCURRENCY);
    }

    #[test]
    fn enumerate_files_filters_by_extension_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("a.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("c.xml"), "<xml/>").unwrap();

        let files = enumerate_files(dir.path(), "html").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.html", "b.html"]);
    }
}
