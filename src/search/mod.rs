//! Denormalized projection, watermark sync, and query translation against an
//! external search engine (C5/C6/C7), behind a narrow [`SearchEngine`] trait
//! so the sync/query logic is testable without a live engine.

pub mod project;
pub mod query;
pub mod sync;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One field's searchable/filterable/sortable/displayed configuration for an
/// index, applied idempotently by `sync --init` (§4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSettings {
    pub primary_key: String,
    pub searchable_attributes: Vec<String>,
    pub filterable_attributes: Vec<String>,
    pub sortable_attributes: Vec<String>,
    pub displayed_attributes: Vec<String>,
    pub typo_min_word_size: Option<u32>,
    pub pagination_max_total_hits: Option<u64>,
    pub synonyms: Vec<(String, Vec<String>)>,
    pub stopwords: Vec<String>,
    pub semantic_embedder: Option<SemanticEmbedderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticEmbedderConfig {
    pub provider: String,
    pub model: String,
    pub document_template: String,
}

/// An asynchronous engine task handle, returned by bulk writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Succeeded,
    Failed,
    Pending,
}

#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub state: TaskState,
    pub error_message: Option<String>,
}

/// Search mode per §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Lexical,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub filter: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub mode: SearchMode,
    pub hybrid_ratio: f32,
    pub locales: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub hits: Vec<Value>,
    pub estimated_total_hits: u64,
}

/// The narrow surface the Sync Engine and Query Translator need from an
/// external search engine. A `reqwest`-backed implementation talks to a real
/// Meilisearch-compatible server; an in-memory double backs unit tests
/// (mirroring the pack's `SqlitePool`-fake pattern for store tests).
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn create_index(&self, index: &str, primary_key: &str) -> Result<()>;
    async fn update_settings(&self, index: &str, settings: &IndexSettings) -> Result<()>;
    async fn bulk_upsert(&self, index: &str, documents: &[Value]) -> Result<TaskHandle>;
    async fn task_status(&self, task: &TaskHandle) -> Result<TaskStatus>;
    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse>;
    async fn similar_documents(
        &self,
        index: &str,
        id: &str,
        limit: u32,
    ) -> Result<Option<SearchResponse>>;
}

/// Poll `task_status` until it leaves `Pending` or `timeout` elapses.
pub async fn wait_for_task(
    engine: &dyn SearchEngine,
    task: &TaskHandle,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<TaskStatus> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let status = engine.task_status(task).await?;
        if status.state != TaskState::Pending {
            return Ok(status);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(crate::error::Error::TaskTimeout {
                task_id: task.task_id.clone(),
                elapsed_secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// `reqwest`-backed engine client, grounded on the teacher's HTTP-client
/// usage pattern (bearer-keyed JSON requests with a configured timeout).
pub struct HttpSearchEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpSearchEngine {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl SearchEngine for HttpSearchEngine {
    async fn create_index(&self, index: &str, primary_key: &str) -> Result<()> {
        let body = serde_json::json!({ "uid": index, "primaryKey": primary_key });
        let resp = self
            .client
            .post(self.url("/indexes"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        classify_response(resp).await
    }

    async fn update_settings(&self, index: &str, settings: &IndexSettings) -> Result<()> {
        let resp = self
            .client
            .patch(self.url(&format!("/indexes/{index}/settings")))
            .bearer_auth(&self.api_key)
            .json(settings)
            .send()
            .await?;
        classify_response(resp).await
    }

    async fn bulk_upsert(&self, index: &str, documents: &[Value]) -> Result<TaskHandle> {
        let resp = self
            .client
            .put(self.url(&format!("/indexes/{index}/documents?primaryKey=id")))
            .bearer_auth(&self.api_key)
            .json(documents)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let message = resp.text().await.unwrap_or_default();
            return Err(classify_status_error(status, message));
        }
        let value: Value = resp.json().await?;
        let task_id = value
            .get("taskUid")
            .or_else(|| value.get("uid"))
            .map(|v| v.to_string())
            .unwrap_or_default();
        Ok(TaskHandle { task_id })
    }

    async fn task_status(&self, task: &TaskHandle) -> Result<TaskStatus> {
        let resp = self
            .client
            .get(self.url(&format!("/tasks/{}", task.task_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let message = resp.text().await.unwrap_or_default();
            return Err(classify_status_error(status, message));
        }
        let value: Value = resp.json().await?;
        let state = match value.get("status").and_then(|v| v.as_str()) {
            Some("succeeded") => TaskState::Succeeded,
            Some("failed") => TaskState::Failed,
            _ => TaskState::Pending,
        };
        let error_message = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(|s| s.to_string());
        Ok(TaskStatus { state, error_message })
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse> {
        let mut body = serde_json::json!({
            "q": request.query,
            "page": request.page,
            "hitsPerPage": request.page_size,
        });
        if let Some(filter) = &request.filter {
            body["filter"] = Value::String(filter.clone());
        }
        match request.mode {
            SearchMode::Lexical => {}
            SearchMode::Semantic => {
                body["hybrid"] = serde_json::json!({ "semanticRatio": 1.0 });
            }
            SearchMode::Hybrid => {
                body["hybrid"] = serde_json::json!({ "semanticRatio": request.hybrid_ratio });
            }
        }
        if !request.locales.is_empty() {
            body["locales"] = serde_json::json!(request.locales);
        }

        let resp = self
            .client
            .post(self.url(&format!("/indexes/{index}/search")))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let message = resp.text().await.unwrap_or_default();
            return Err(classify_status_error(status, message));
        }
        let value: Value = resp.json().await?;
        let hits = value
            .get("hits")
            .and_then(|h| h.as_array())
            .cloned()
            .unwrap_or_default();
        let estimated_total_hits = value
            .get("estimatedTotalHits")
            .and_then(|v| v.as_u64())
            .unwrap_or(hits.len() as u64);
        Ok(SearchResponse {
            hits,
            estimated_total_hits,
        })
    }

    async fn similar_documents(
        &self,
        index: &str,
        id: &str,
        limit: u32,
    ) -> Result<Option<SearchResponse>> {
        let resp = self
            .client
            .post(self.url(&format!("/indexes/{index}/similar")))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "id": id, "limit": limit }))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let message = resp.text().await.unwrap_or_default();
            return Err(classify_status_error(status, message));
        }
        let value: Value = resp.json().await?;
        let hits = value
            .get("hits")
            .and_then(|h| h.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(Some(SearchResponse {
            estimated_total_hits: hits.len() as u64,
            hits,
        }))
    }
}

async fn classify_response(resp: reqwest::Response) -> Result<()> {
    if resp.status().is_success() {
        return Ok(());
    }
    let status = resp.status();
    let message = resp.text().await.unwrap_or_default();
    Err(classify_status_error(status, message))
}

fn classify_status_error(status: reqwest::StatusCode, message: String) -> crate::error::Error {
    if status.is_client_error() {
        crate::error::Error::EngineBadRequest(message)
    } else {
        crate::error::Error::EngineUnavailable(message)
    }
}

#[cfg(test)]
pub mod test_double {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory [`SearchEngine`] double: every write completes synchronously
    /// with an already-succeeded task, so sync/query logic can be tested
    /// without a live engine.
    #[derive(Default)]
    pub struct InMemorySearchEngine {
        indexes: Mutex<HashMap<String, Vec<Value>>>,
        settings: Mutex<HashMap<String, IndexSettings>>,
        next_task: Mutex<u64>,
    }

    impl InMemorySearchEngine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn documents(&self, index: &str) -> Vec<Value> {
            self.indexes.lock().unwrap().get(index).cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl SearchEngine for InMemorySearchEngine {
        async fn create_index(&self, index: &str, _primary_key: &str) -> Result<()> {
            self.indexes.lock().unwrap().entry(index.to_string()).or_default();
            Ok(())
        }

        async fn update_settings(&self, index: &str, settings: &IndexSettings) -> Result<()> {
            self.settings
                .lock()
                .unwrap()
                .insert(index.to_string(), settings.clone());
            Ok(())
        }

        async fn bulk_upsert(&self, index: &str, documents: &[Value]) -> Result<TaskHandle> {
            let mut indexes = self.indexes.lock().unwrap();
            let store = indexes.entry(index.to_string()).or_default();
            for doc in documents {
                let id = doc.get("id").cloned();
                if let Some(id) = id {
                    store.retain(|d| d.get("id") != Some(&id));
                }
                store.push(doc.clone());
            }
            let mut counter = self.next_task.lock().unwrap();
            *counter += 1;
            Ok(TaskHandle {
                task_id: counter.to_string(),
            })
        }

        async fn task_status(&self, _task: &TaskHandle) -> Result<TaskStatus> {
            Ok(TaskStatus {
                state: TaskState::Succeeded,
                error_message: None,
            })
        }

        async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse> {
            let indexes = self.indexes.lock().unwrap();
            let hits: Vec<Value> = indexes
                .get(index)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|doc| {
                    request.query.is_empty()
                        || doc
                            .get("text")
                            .and_then(|t| t.as_str())
                            .is_some_and(|t| t.to_lowercase().contains(&request.query.to_lowercase()))
                })
                .collect();
            Ok(SearchResponse {
                estimated_total_hits: hits.len() as u64,
                hits,
            })
        }

        async fn similar_documents(
            &self,
            _index: &str,
            _id: &str,
            _limit: u32,
        ) -> Result<Option<SearchResponse>> {
            Ok(None)
        }
    }
}
