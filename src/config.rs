//! Layered configuration: built-in defaults, then environment, then CLI flags.

use clap::Parser;

use crate::error::{Error, Result};

/// Every recognized configuration option, resolved once at load time.
#[derive(Parser, Debug, Clone)]
#[command(name = "polibase-transcripts")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Full Postgres DSN. When unset, assembled from POSTGRES_* parts.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "POSTGRES_DB", default_value = "polibase")]
    pub postgres_db: String,
    #[arg(long, env = "POSTGRES_USER", default_value = "postgres")]
    pub postgres_user: String,
    #[arg(long, env = "POSTGRES_PASSWORD", default_value = "")]
    pub postgres_password: String,
    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,
    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    /// Search engine base URL (Meilisearch-shaped HTTP API).
    #[arg(long, env = "MEILI_HOST")]
    pub meili_host: Option<String>,
    /// Search engine master key.
    #[arg(long, env = "MEILI_MASTER_KEY")]
    pub meili_master_key: Option<String>,
    /// Request timeout against the search engine, in seconds.
    #[arg(long, env = "MEILI_TIMEOUT", default_value_t = 30)]
    pub meili_timeout_secs: u64,

    /// Legacy alias for `meili_host`, honored only when `meili_host` is unset.
    #[arg(long, env = "MEILISEARCH_URL", hide = true)]
    pub meilisearch_url: Option<String>,
    /// Legacy alias for `meili_master_key`, honored only when it is unset.
    #[arg(long, env = "MEILISEARCH_MASTER_KEY", hide = true)]
    pub meilisearch_master_key: Option<String>,

    #[arg(long, env = "HTML_DATA_DIR", default_value = "/data/html")]
    pub html_data_dir: String,
    #[arg(long, env = "XML_DATA_DIR", default_value = "/data/xml")]
    pub xml_data_dir: String,
    #[arg(long, env = "PROCESSED_DATA_DIR", default_value = "/data/processed")]
    pub processed_data_dir: String,
    #[arg(long, env = "UPLOAD_DIR", default_value = "/data/uploads")]
    pub upload_dir: String,

    /// Only used by the semantic embedder and the out-of-scope YouTube ingest collaborator.
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "MAX_SEARCH_RESULTS", default_value_t = 1_000_000)]
    pub max_search_results: u64,
    #[arg(long, env = "DEFAULT_PAGE_SIZE", default_value_t = 25)]
    pub default_page_size: u32,

    /// File holding the incremental-sync watermark.
    #[arg(long, env = "SYNC_STATE_FILE", default_value = ".meili_sync_state.json")]
    pub sync_state_file: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
    /// Pretty, human-readable log output instead of JSON.
    #[arg(long)]
    pub verbose: bool,
}

impl Config {
    /// Resolve legacy env aliases once, here, rather than at each use site.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::parse();
        cfg.finish()?;
        Ok(cfg)
    }

    /// Resolve legacy aliases and validate. Callers that obtain a `Config`
    /// via `#[command(flatten)]` on their own `Parser` (rather than
    /// `Config::parse()` directly) must call this once after parsing.
    pub fn finish(&mut self) -> Result<()> {
        if self.meili_host.is_none() {
            self.meili_host = self.meilisearch_url.clone();
        }
        if self.meili_master_key.is_none() {
            self.meili_master_key = self.meilisearch_master_key.clone();
        }
        self.validate()
    }

    /// The DSN to connect with: explicit override, or assembled from parts.
    pub fn database_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(|| {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.postgres_user,
                self.postgres_password,
                self.postgres_host,
                self.postgres_port,
                self.postgres_db
            )
        })
    }

    pub fn meili_host(&self) -> Result<&str> {
        self.meili_host
            .as_deref()
            .ok_or_else(|| Error::config("MEILI_HOST (or legacy MEILISEARCH_URL) is required"))
    }

    pub fn meili_master_key(&self) -> Result<&str> {
        self.meili_master_key.as_deref().ok_or_else(|| {
            Error::config("MEILI_MASTER_KEY (or legacy MEILISEARCH_MASTER_KEY) is required")
        })
    }

    fn validate(&self) -> Result<()> {
        if self.postgres_port == 0 {
            return Err(Error::config("postgres_port must be nonzero"));
        }
        if let Some(host) = &self.meili_host {
            if !host.starts_with("http://") && !host.starts_with("https://") {
                return Err(Error::config("meili_host must start with http:// or https://"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config::parse_from(["polibase-transcripts"])
    }

    #[test]
    fn database_url_assembled_from_parts_when_unset() {
        let cfg = base();
        assert_eq!(
            cfg.database_url(),
            "postgres://postgres:@localhost:5432/polibase"
        );
    }

    #[test]
    fn explicit_database_url_wins() {
        let mut cfg = base();
        cfg.database_url = Some("postgres://x/y".to_string());
        assert_eq!(cfg.database_url(), "postgres://x/y");
    }

    #[test]
    fn legacy_meili_alias_used_when_primary_unset() {
        let mut cfg = base();
        cfg.meilisearch_url = Some("https://legacy.example".to_string());
        cfg.meili_host = None;
        // load() performs the alias resolution; simulate it directly here.
        if cfg.meili_host.is_none() {
            cfg.meili_host = cfg.meilisearch_url.clone();
        }
        assert_eq!(cfg.meili_host().unwrap(), "https://legacy.example");
    }

    #[test]
    fn rejects_bad_meili_scheme() {
        let mut cfg = base();
        cfg.meili_host = Some("ftp://bad".to_string());
        assert!(cfg.validate().is_err());
    }
}
