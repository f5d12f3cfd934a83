//! Durable work queue backed by the `job_runs` table.
//!
//! Producers (the scheduler, the lookup path, the API) enqueue; the worker
//! pool claims. Claiming is a conditional update, so a run is handed to at
//! most one worker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{NewJobRun, Store};
use crate::jobs::{JobError, JobRequest, ProgressReporter};
use crate::models::{JobRun, JobStatus};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Job run not found: {0}")]
    NotFound(String),

    #[error("Job run {0} is no longer pending")]
    NotPending(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for QueueError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<JobError> for QueueError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::InvalidInput(msg) => Self::InvalidJob(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub queue: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Name of the schedule entry that produced the run.
    pub schedule: Option<String>,
}

#[derive(Clone)]
pub struct JobQueue {
    store: Store,
    notify: Arc<Notify>,
    default_queue: String,
}

impl JobQueue {
    #[must_use]
    pub fn new(store: Store, default_queue: impl Into<String>) -> Self {
        Self {
            store,
            notify: Arc::new(Notify::new()),
            default_queue: default_queue.into(),
        }
    }

    pub async fn enqueue(
        &self,
        request: &JobRequest,
        options: EnqueueOptions,
    ) -> Result<String, QueueError> {
        let id = Uuid::new_v4().to_string();
        let job = request.kind().as_str();

        self.store
            .insert_job_run(&NewJobRun {
                id: id.clone(),
                job: job.to_string(),
                args: request.args(),
                queue: Some(options.queue.unwrap_or_else(|| self.default_queue.clone())),
                schedule_name: options.schedule,
                expires_at: options.expires_at,
            })
            .await?;

        metrics::counter!("jobs_enqueued_total", "job" => job).increment(1);
        info!(event = "job_enqueued", job_name = job, run_id = %id, "Job enqueued");

        self.notify.notify_one();
        Ok(id)
    }

    /// Enqueues by job name, validating the arguments first.
    pub async fn enqueue_named(
        &self,
        job: &str,
        args: &serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<String, QueueError> {
        let request = JobRequest::from_parts(job, args)?;
        self.enqueue(&request, options).await
    }

    /// Withdraws a run that has not started yet.
    pub async fn cancel(&self, id: &str) -> Result<bool, QueueError> {
        let cancelled = self.store.cancel_job_run(id).await?;
        if cancelled {
            info!(event = "job_cancelled", run_id = %id, "Job run cancelled");
        }
        Ok(cancelled)
    }

    pub async fn get(&self, id: &str) -> Result<Option<JobRun>, QueueError> {
        Ok(self.store.get_job_run(id).await?)
    }

    pub async fn list(&self, limit: u64) -> Result<Vec<JobRun>, QueueError> {
        Ok(self.store.list_job_runs(limit).await?)
    }

    pub async fn count(&self, status: JobStatus) -> Result<u64, QueueError> {
        Ok(self.store.count_job_runs(status).await?)
    }

    pub async fn claim_next(&self) -> Result<Option<JobRun>, QueueError> {
        Ok(self.store.claim_next_job_run(Utc::now()).await?)
    }

    pub async fn report_progress(
        &self,
        id: &str,
        current: u32,
        total: u32,
    ) -> Result<bool, QueueError> {
        Ok(self.store.update_job_progress(id, current, total).await?)
    }

    pub async fn complete(&self, id: &str, result: &serde_json::Value) -> Result<(), QueueError> {
        if !self.store.complete_job_run(id, result).await? {
            warn!(run_id = %id, "Completed a run that was not running");
        }
        Ok(())
    }

    pub async fn fail(&self, id: &str, error: &str) -> Result<(), QueueError> {
        if !self.store.fail_job_run(id, error).await? {
            warn!(run_id = %id, "Failed a run that was not running");
        }
        Ok(())
    }

    pub async fn recover_interrupted(&self) -> Result<u64, QueueError> {
        let recovered = self.store.recover_interrupted_job_runs().await?;
        if recovered > 0 {
            warn!(recovered, "Marked interrupted job runs as failed");
        }
        Ok(recovered)
    }

    /// Waits until work may be available or `timeout` elapses.
    pub async fn wait_for_work(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }

    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }
}

/// Publishes job progress onto its run row.
pub struct RunProgress {
    queue: JobQueue,
    run_id: String,
}

impl RunProgress {
    #[must_use]
    pub const fn new(queue: JobQueue, run_id: String) -> Self {
        Self { queue, run_id }
    }
}

#[async_trait]
impl ProgressReporter for RunProgress {
    async fn report(&self, current: u32, total: u32) {
        if let Err(e) = self.queue.report_progress(&self.run_id, current, total).await {
            warn!(run_id = %self.run_id, error = %e, "Failed to record job progress");
        }
    }
}
