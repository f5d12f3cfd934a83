use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clients::{OpenWeatherClient, WeatherProvider};
use crate::config::Config;
use crate::db::Store;
use crate::jobs::JobRunner;
use crate::services::{DefaultWeatherService, JobQueue, RetryPolicy, WeatherService};

/// Build a shared HTTP client with reasonable defaults for API calls.
/// This client should be reused across all HTTP-based services to enable
/// connection pooling and avoid socket exhaustion.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(concat!("meteod/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    /// Weather records and schedule entries.
    pub store: Store,

    pub queue: JobQueue,

    pub provider: Arc<dyn WeatherProvider>,

    pub runner: JobRunner,

    pub weather_service: Arc<dyn WeatherService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = build_shared_http_client(config.provider.timeout_seconds)?;
        let provider = Arc::new(OpenWeatherClient::new(&config.provider, http_client))
            as Arc<dyn WeatherProvider>;
        Self::with_provider(config, provider).await
    }

    pub async fn with_provider(
        config: Config,
        provider: Arc<dyn WeatherProvider>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let queue_store = if config.queue_database_url() == config.general.database_path {
            store.clone()
        } else {
            Store::with_pool_options(
                config.queue_database_url(),
                config.general.max_db_connections,
                config.general.min_db_connections,
            )
            .await?
        };
        let queue = JobQueue::new(queue_store, config.queue.default_queue.clone());

        let runner = JobRunner::new(store.clone(), provider.clone(), config.jobs.clone());

        let weather_service = Arc::new(DefaultWeatherService::new(
            store.clone(),
            provider.clone(),
            queue.clone(),
            RetryPolicy::from_config(&config.provider),
        )) as Arc<dyn WeatherService>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            queue,
            provider,
            runner,
            weather_service,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
