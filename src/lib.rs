pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod jobs;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, JobCommands};
pub use config::Config;
use services::{Scheduler, SyncMode, WorkerPool, sync_schedules};
use state::SharedState;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    init_tracing(&config)?;

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Daemon => run_daemon(config, prometheus_handle).await,

        Commands::Lookup { city, country } => {
            let city = city.join(" ");
            cli::cmd_lookup(config, &city, country.as_deref()).await
        }

        Commands::History { limit } => cli::cmd_history(&config, limit).await,

        Commands::RunJob { job, args, enqueue } => {
            cli::cmd_run_job(config, &job, args.as_deref(), enqueue).await
        }

        Commands::Jobs { command } => match command {
            JobCommands::List { limit } => cli::cmd_jobs_list(config, limit).await,
            JobCommands::Show { id } => cli::cmd_jobs_show(config, &id).await,
            JobCommands::Cancel { id } => cli::cmd_jobs_cancel(config, &id).await,
        },

        Commands::SyncSchedules { replace, dry_run } => {
            cli::cmd_sync_schedules(&config, SyncMode { replace, dry_run }).await
        }

        Commands::Export { format, output } => {
            cli::cmd_export(&config, format.into(), output.as_deref()).await
        }

        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists, leaving it untouched.");
            }
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key.as_str(), value)?;
        }
        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    Ok(())
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "meteod v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let shared = Arc::new(SharedState::new(config.clone()).await?);

    shared.queue.recover_interrupted().await?;

    if config.scheduler.sync_on_start {
        let report = sync_schedules(
            &shared.store,
            &config.schedules,
            SyncMode {
                replace: config.scheduler.replace_on_start,
                dry_run: false,
            },
        )
        .await;

        info!(
            event = "schedules_synced",
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            rejected = report.errors.len(),
            "Schedule definitions synced"
        );
        for rejected in &report.errors {
            warn!(schedule = %rejected.name, error = %rejected.error, "Schedule definition rejected");
        }
    }

    let mut workers = WorkerPool::new(shared.queue.clone(), shared.runner.clone());
    workers
        .start(
            config.queue.workers,
            Duration::from_millis(config.queue.poll_interval_ms),
        )
        .await;

    let scheduler = Arc::new(Scheduler::new(
        shared.store.clone(),
        shared.queue.clone(),
        config.scheduler.clone(),
    ));

    let scheduler_handle = {
        let sched = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = sched.start().await {
                error!("Scheduler error: {}", e);
            }
        })
    };

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let port = config.server.port;
        info!("Starting Web API on port {}", port);

        let api_state = api::create_app_state(Arc::clone(&shared), prometheus_handle);
        let app = api::router(api_state).await;
        let addr = format!("0.0.0.0:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        Some(tokio::spawn(async move {
            info!("Web Server running at http://0.0.0.0:{}", port);
            if let Err(e) = axum::serve(listener, app).await {
                error!("Web server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    if let Some(handle) = server_handle {
        handle.abort();
    }

    scheduler.stop().await;
    if let Err(e) = scheduler_handle.await {
        error!("Scheduler task failed: {}", e);
    }

    workers.shutdown().await;
    info!("Daemon stopped");

    Ok(())
}
