use crate::config::Config;
use crate::models::JobRun;
use crate::state::SharedState;

fn print_run(run: &JobRun) {
    let progress = run
        .progress
        .map(|p| format!(" {}/{}", p.current, p.total))
        .unwrap_or_default();

    println!("• {} [{}{}] {}", run.id, run.status, progress, run.job);
    println!("  Enqueued: {}", run.enqueued_at);
    if let Some(schedule) = &run.schedule_name {
        println!("  Schedule: {}", schedule);
    }
    if let Some(error) = &run.error {
        println!("  Error: {}", error);
    }
}

pub async fn cmd_jobs_list(config: Config, limit: u64) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;
    let runs = state.queue.list(limit).await?;

    if runs.is_empty() {
        println!("No job runs.");
        return Ok(());
    }

    println!("Job Runs ({} shown)", runs.len());
    println!("{:-<70}", "");
    for run in &runs {
        print_run(run);
    }

    Ok(())
}

pub async fn cmd_jobs_show(config: Config, id: &str) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    let Some(run) = state.queue.get(id).await? else {
        println!("Job run {} not found.", id);
        return Ok(());
    };

    print_run(&run);
    println!("  Args: {}", run.args);
    if let Some(result) = &run.result {
        println!("  Result:");
        println!("{}", serde_json::to_string_pretty(result)?);
    }

    Ok(())
}

pub async fn cmd_jobs_cancel(config: Config, id: &str) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    if state.queue.get(id).await?.is_none() {
        println!("Job run {} not found.", id);
    } else if state.queue.cancel(id).await? {
        println!("✓ Cancelled job run {}", id);
    } else {
        println!("Job run {} already started and can no longer be cancelled.", id);
    }

    Ok(())
}
