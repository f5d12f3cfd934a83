//! Run-job command handler

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::jobs::{JobRequest, ProgressReporter};
use crate::services::EnqueueOptions;
use crate::state::SharedState;

struct PrintProgress;

#[async_trait]
impl ProgressReporter for PrintProgress {
    async fn report(&self, current: u32, total: u32) {
        println!("  [{}/{}]", current, total);
    }
}

pub async fn cmd_run_job(
    config: Config,
    job: &str,
    args: Option<&str>,
    enqueue: bool,
) -> anyhow::Result<()> {
    let args: Value = match args {
        Some(raw) => serde_json::from_str(raw).context("--args must be a JSON object")?,
        None => Value::Object(serde_json::Map::new()),
    };

    let request = JobRequest::from_parts(job, &args)?;
    let state = SharedState::new(config).await?;

    if enqueue {
        let id = state
            .queue
            .enqueue(&request, EnqueueOptions::default())
            .await?;
        println!("✓ Queued {} as job {}", request.kind(), id);
        println!("A running daemon will pick it up.");
        return Ok(());
    }

    println!("Running {}...", request.kind());
    let report = state.runner.execute(&request, &PrintProgress).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
