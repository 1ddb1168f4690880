//! Process-wide job status with push notifications to subscribers (C8).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Terminal or in-flight status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Snapshot of the most recent job's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: String,
    pub status: JobStatus,
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub current_file: Option<String>,
    /// Truncated to the last 10 errors per §4.4.
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const MAX_ERRORS: usize = 10;

impl JobProgress {
    pub fn new(job_id: impl Into<String>, total_files: usize) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            status: JobStatus::Running,
            total_files,
            processed_files: 0,
            failed_files: 0,
            current_file: None,
            errors: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    fn push_error(&mut self, message: String) {
        self.errors.push(message);
        if self.errors.len() > MAX_ERRORS {
            let overflow = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..overflow);
        }
    }
}

/// A process-local bus holding the latest job snapshot and broadcasting updates.
///
/// Mirrors the teacher's `Arc<RwLock<_>>` shared-state idiom, but uses a
/// `watch` channel so pushed subscribers (§4.8's "push endpoint") get
/// notified rather than having to poll.
#[derive(Clone)]
pub struct ProgressBus {
    tx: Arc<watch::Sender<Option<JobProgress>>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel any job left `running` — called once at startup per §4.8.
    pub fn cancel_stale_running_job(&self) {
        self.tx.send_if_modified(|current| {
            if let Some(progress) = current {
                if progress.status == JobStatus::Running {
                    progress.status = JobStatus::Cancelled;
                    progress.updated_at = Utc::now();
                    return true;
                }
            }
            false
        });
    }

    pub fn start_job(&self, job_id: impl Into<String>, total_files: usize) {
        let _ = self.tx.send(Some(JobProgress::new(job_id, total_files)));
    }

    pub fn record_processed(&self, current_file: impl Into<String>) {
        self.tx.send_if_modified(|current| {
            if let Some(progress) = current {
                progress.processed_files += 1;
                progress.current_file = Some(current_file.into());
                progress.updated_at = Utc::now();
                return true;
            }
            false
        });
    }

    pub fn record_failure(&self, current_file: impl Into<String>, error: impl Into<String>) {
        self.tx.send_if_modified(|current| {
            if let Some(progress) = current {
                progress.failed_files += 1;
                progress.current_file = Some(current_file.into());
                progress.push_error(error.into());
                progress.updated_at = Utc::now();
                return true;
            }
            false
        });
    }

    pub fn finish_job(&self, status: JobStatus) {
        self.tx.send_if_modified(|current| {
            if let Some(progress) = current {
                progress.status = status;
                progress.updated_at = Utc::now();
                return true;
            }
            false
        });
    }

    /// A point-in-time snapshot for the polling endpoint.
    pub fn snapshot(&self) -> Option<JobProgress> {
        self.tx.borrow().clone()
    }

    /// A subscription for the push endpoint; terminates once the job reaches
    /// a terminal status (the caller observes this via [`JobStatus::is_terminal`]).
    pub fn subscribe(&self) -> watch::Receiver<Option<JobProgress>> {
        self.tx.subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancels_stale_running_job_on_startup() {
        let bus = ProgressBus::new();
        bus.start_job("job-1", 3);
        bus.cancel_stale_running_job();
        assert_eq!(bus.snapshot().unwrap().status, JobStatus::Cancelled);
    }

    #[test]
    fn leaves_terminal_job_alone() {
        let bus = ProgressBus::new();
        bus.start_job("job-1", 3);
        bus.finish_job(JobStatus::Completed);
        bus.cancel_stale_running_job();
        assert_eq!(bus.snapshot().unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn truncates_errors_to_last_ten() {
        let bus = ProgressBus::new();
        bus.start_job("job-1", 20);
        for i in 0..15 {
            bus.record_failure(format!("file{i}.html"), format!("error {i}"));
        }
        let snap = bus.snapshot().unwrap();
        assert_eq!(snap.errors.len(), 10);
        assert_eq!(snap.errors[0], "error 5");
        assert_eq!(snap.failed_files, 15);
    }

    #[tokio::test]
    async fn subscriber_observes_terminal_status() {
        let bus = ProgressBus::new();
        bus.start_job("job-1", 1);
        let mut rx = bus.subscribe();
        bus.finish_job(JobStatus::Completed);
        rx.changed().await.unwrap();
        assert!(rx.borrow().as_ref().unwrap().status.is_terminal());
    }
}
