//! Crate-wide error taxonomy.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can propagate out of a top-level operation.
///
/// Per-file parse/ingest failures are *not* represented here — they are
/// recorded as [`crate::ingest::FileOutcome`] values inside a job's
/// `errors[]` and never unwind past the orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    /// A unique-key collision the caller is expected to retry after a reread.
    #[error("conflict on unique key: {0}")]
    ConflictOnUniqueKey(String),

    /// A transaction was aborted by the database and not retried successfully.
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// The search engine could not be reached.
    #[error("search engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The search engine rejected a request as malformed.
    #[error("search engine rejected request: {0}")]
    EngineBadRequest(String),

    /// A task polled against the search engine did not finish before the timeout.
    #[error("task {task_id} timed out after {elapsed_secs}s")]
    TaskTimeout { task_id: String, elapsed_secs: u64 },

    /// An ingest or sync job was cancelled before completion.
    #[error("cancelled")]
    Cancelled,

    /// A file parsed with zero recognizable segments; the ingest job counts
    /// it as failed rather than persisting an empty video.
    #[error("no segments")]
    NoSegments,

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database driver error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed to apply.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// HTTP transport error talking to the search engine.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error, e.g. of the sync watermark file.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn conflict(key: impl Into<String>) -> Self {
        Self::ConflictOnUniqueKey(key.into())
    }

    pub fn engine_unavailable(msg: impl Into<String>) -> Self {
        Self::EngineUnavailable(msg.into())
    }

    pub fn engine_bad_request(msg: impl Into<String>) -> Self {
        Self::EngineBadRequest(msg.into())
    }
}
