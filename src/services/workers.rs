use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::queue::{JobQueue, RunProgress};
use crate::jobs::{JobRequest, JobRunner};
use crate::models::JobRun;

/// Fixed-size pool of tokio tasks draining the work queue.
pub struct WorkerPool {
    queue: JobQueue,
    runner: JobRunner,
    running: Arc<RwLock<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(queue: JobQueue, runner: JobRunner) -> Self {
        Self {
            queue,
            runner,
            running: Arc::new(RwLock::new(false)),
            handles: Vec::new(),
        }
    }

    pub async fn start(&mut self, size: usize, poll_interval: Duration) {
        *self.running.write().await = true;
        info!(workers = size, "Starting worker pool");

        for worker_id in 0..size {
            let queue = self.queue.clone();
            let runner = self.runner.clone();
            let running = Arc::clone(&self.running);

            self.handles.push(tokio::spawn(async move {
                worker_loop(worker_id, queue, runner, running, poll_interval).await;
            }));
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Stops claiming new runs and waits for in-flight runs to finish.
    pub async fn shutdown(&mut self) {
        info!("Stopping worker pool...");
        *self.running.write().await = false;
        self.queue.wake_all();

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task panicked");
            }
        }
        info!("Worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: JobQueue,
    runner: JobRunner,
    running: Arc<RwLock<bool>>,
    poll_interval: Duration,
) {
    loop {
        if !*running.read().await {
            break;
        }

        match queue.claim_next().await {
            Ok(Some(run)) => execute_run(worker_id, &queue, &runner, run).await,
            Ok(None) => queue.wait_for_work(poll_interval).await,
            Err(e) => {
                error!(worker_id, error = %e, "Failed to claim job run");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

/// Runs one claimed job to completion and records the outcome.
pub async fn execute_run(worker_id: usize, queue: &JobQueue, runner: &JobRunner, run: JobRun) {
    let start = Instant::now();
    let job_name = run.job.clone();

    info!(
        event = "job_started",
        job_name = %job_name,
        run_id = %run.id,
        worker_id,
        "Starting job run"
    );

    let outcome = match JobRequest::from_parts(&run.job, &run.args) {
        Ok(request) => {
            let progress = RunProgress::new(queue.clone(), run.id.clone());
            runner.execute(&request, &progress).await
        }
        Err(e) => Err(e),
    };

    let duration = start.elapsed();
    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

    let (label, recorded) = match outcome {
        Ok(result) => {
            info!(
                event = "job_finished",
                job_name = %job_name,
                run_id = %run.id,
                duration_ms,
                "Job run succeeded"
            );
            ("succeeded", queue.complete(&run.id, &result).await)
        }
        Err(e) => {
            warn!(
                event = "job_failed",
                job_name = %job_name,
                run_id = %run.id,
                duration_ms,
                error = %e,
                "Job run failed"
            );
            ("failed", queue.fail(&run.id, &e.to_string()).await)
        }
    };

    if let Err(e) = recorded {
        error!(run_id = %run.id, error = %e, "Failed to record job outcome");
    }

    metrics::counter!("jobs_finished_total", "job" => job_name.clone(), "outcome" => label)
        .increment(1);
    metrics::histogram!("job_duration_seconds", "job" => job_name).record(duration.as_secs_f64());
}
