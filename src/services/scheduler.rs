use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use super::queue::{EnqueueOptions, JobQueue};
use crate::config::SchedulerConfig;
use crate::db::Store;
use crate::jobs::JobRequest;
use crate::models::ScheduleEntry;

/// Fires persisted schedule entries. A firing only enqueues; the worker
/// pool does the actual work.
pub struct Scheduler {
    store: Store,
    queue: JobQueue,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    pub fn new(store: Store, queue: JobQueue, config: SchedulerConfig) -> Self {
        Self {
            store,
            queue,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        let mut sched = JobScheduler::new().await?;
        let entries = self.store.list_enabled_schedules().await?;

        for entry in &entries {
            let expression = entry.crontab.to_cron_expression();
            let store = self.store.clone();
            let queue = self.queue.clone();
            let running = Arc::clone(&self.running);
            let name = entry.name.clone();

            let job = Job::new_async(expression.as_str(), move |_uuid, _lock| {
                let store = store.clone();
                let queue = queue.clone();
                let running = Arc::clone(&running);
                let name = name.clone();
                Box::pin(async move {
                    if !*running.read().await {
                        return;
                    }
                    if let Err(e) = fire(&store, &queue, &name).await {
                        error!(event = "schedule_failed", schedule = %name, error = %e, "Scheduled enqueue failed");
                    }
                })
            });

            match job {
                Ok(job) => {
                    sched.add(job).await?;
                    info!(schedule = %entry.name, job_name = %entry.job, cron = %entry.crontab, "Schedule registered");
                }
                Err(e) => {
                    warn!(schedule = %entry.name, error = %e, "Skipping schedule with invalid crontab");
                }
            }
        }

        sched.start().await?;
        info!(schedules = entries.len(), "Scheduler running");

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

/// Enqueues the job of one schedule entry, re-reading the entry so that
/// disabled or expired entries stop firing. Returns the run id if enqueued.
pub async fn fire(store: &Store, queue: &JobQueue, name: &str) -> Result<Option<String>> {
    let Some(entry) = store.get_schedule(name).await? else {
        warn!(schedule = name, "Schedule entry disappeared, not enqueuing");
        return Ok(None);
    };

    let now = Utc::now();
    if !entry.enabled || entry.is_expired(now) {
        info!(schedule = name, "Schedule entry disabled or expired, not enqueuing");
        return Ok(None);
    }

    let request = request_for(&entry)?;
    let run_id = queue
        .enqueue(
            &request,
            EnqueueOptions {
                queue: entry.queue.clone(),
                expires_at: entry.expires_at,
                schedule: Some(entry.name.clone()),
            },
        )
        .await?;

    store.record_schedule_enqueued(name, now).await?;
    Ok(Some(run_id))
}

fn request_for(entry: &ScheduleEntry) -> Result<JobRequest> {
    let args = entry
        .args
        .clone()
        .unwrap_or_else(|| serde_json::json!({}));
    Ok(JobRequest::from_parts(&entry.job, &args)?)
}
