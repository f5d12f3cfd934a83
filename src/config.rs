use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{CrontabFields, ScheduleDefinition};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub provider: ProviderConfig,

    pub queue: QueueConfig,

    pub scheduler: SchedulerConfig,

    pub jobs: JobsConfig,

    pub server: ServerConfig,

    pub observability: ObservabilityConfig,

    /// Static cadence definitions reconciled into the database on sync.
    pub schedules: Vec<ScheduleDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            provider: ProviderConfig::default(),
            queue: QueueConfig::default(),
            scheduler: SchedulerConfig::default(),
            jobs: JobsConfig::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            schedules: default_schedules(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/meteod.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,

    pub api_key: String,

    /// Per-call timeout in seconds (default: 10)
    pub timeout_seconds: u64,

    /// Attempts made by the lookup path, first call included (default: 2)
    pub retry_attempts: u32,

    pub retry_initial_delay_ms: u64,

    pub retry_max_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            api_key: String::new(),
            timeout_seconds: 10,
            retry_attempts: 2,
            retry_initial_delay_ms: 200,
            retry_max_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Database holding the job queue. Falls back to `general.database_path`.
    pub url: Option<String>,

    /// Size of the worker pool (default: 2)
    pub workers: usize,

    /// How long an idle worker waits before polling again.
    pub poll_interval_ms: u64,

    pub default_queue: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: None,
            workers: 2,
            poll_interval_ms: 1000,
            default_queue: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Reconcile `schedules` into the database when the daemon starts.
    pub sync_on_start: bool,

    /// Overwrite existing entries during the startup sync.
    pub replace_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_on_start: true,
            replace_on_start: false,
        }
    }
}

/// Tunable policy of the background jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub retention_days: i64,

    /// Pause between provider calls in a bulk update.
    pub bulk_update_pause_ms: u64,

    /// A (city, day) group is trimmed once it holds more than this many records.
    pub duplicate_threshold: usize,

    pub duplicate_keep: usize,

    pub top_cities: usize,

    pub statistics_days: i64,

    pub export_preview_chars: usize,

    pub alerts: AlertThresholds,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            bulk_update_pause_ms: 500,
            duplicate_threshold: 5,
            duplicate_keep: 3,
            top_cities: 10,
            statistics_days: 7,
            export_preview_chars: 500,
            alerts: AlertThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub window_hours: i64,

    pub heat_celsius: f64,

    pub cold_celsius: f64,

    /// Wind speed in m/s.
    pub wind_speed: f64,

    pub humidity: i32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            window_hours: 24,
            heat_celsius: 40.0,
            cold_celsius: -10.0,
            wind_speed: 15.0,
            humidity: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "meteod".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

#[must_use]
pub fn default_schedules() -> Vec<ScheduleDefinition> {
    vec![
        ScheduleDefinition::crontab(
            "generate-statistics",
            "generate_statistics",
            CrontabFields::new("0", "*", "*"),
        ),
        ScheduleDefinition::crontab(
            "cleanup-old-searches",
            "cleanup",
            CrontabFields::new("0", "2", "*"),
        ),
        ScheduleDefinition::crontab(
            "send-weather-alerts",
            "send_alerts",
            CrontabFields::new("*/30", "*", "*"),
        ),
        ScheduleDefinition::crontab(
            "database-maintenance",
            "database_maintenance",
            CrontabFields::new("0", "3", "Sun"),
        ),
        ScheduleDefinition::crontab(
            "export-weather-data",
            "export_data",
            CrontabFields::new("0", "4", "*"),
        )
        .with_args(serde_json::json!({ "format": "csv" })),
    ]
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Applies the enumerated environment variables on top of the file values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENWEATHER_API_KEY") {
            self.provider.api_key = key;
        }
        if let Some(url) = lookup("METEOD_PROVIDER_URL") {
            self.provider.base_url = url;
        }
        if let Some(timeout) = lookup("METEOD_PROVIDER_TIMEOUT_SECONDS") {
            self.provider.timeout_seconds = timeout
                .parse()
                .with_context(|| format!("Invalid METEOD_PROVIDER_TIMEOUT_SECONDS: {timeout}"))?;
        }
        if let Some(url) = lookup("METEOD_DATABASE_URL") {
            self.general.database_path = url;
        }
        if let Some(url) = lookup("METEOD_QUEUE_URL") {
            self.queue.url = Some(url);
        }
        if let Some(level) = lookup("METEOD_LOG_LEVEL") {
            self.general.log_level = level;
        }
        if let Some(port) = lookup("METEOD_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid METEOD_PORT: {port}"))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn queue_database_url(&self) -> &str {
        self.queue
            .url
            .as_deref()
            .unwrap_or(&self.general.database_path)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("meteod").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".meteod").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.base_url.is_empty() {
            anyhow::bail!("Provider base URL cannot be empty");
        }
        url::Url::parse(&self.provider.base_url)
            .with_context(|| format!("Invalid provider base URL: {}", self.provider.base_url))?;

        if self.provider.timeout_seconds == 0 {
            anyhow::bail!("Provider timeout must be > 0");
        }

        if self.queue.workers == 0 {
            anyhow::bail!("Worker pool size must be > 0");
        }

        if self.jobs.duplicate_keep > self.jobs.duplicate_threshold {
            anyhow::bail!(
                "jobs.duplicate_keep ({}) cannot exceed jobs.duplicate_threshold ({})",
                self.jobs.duplicate_keep,
                self.jobs.duplicate_threshold
            );
        }

        if self.jobs.retention_days <= 0 {
            anyhow::bail!("jobs.retention_days must be > 0");
        }

        Ok(())
    }
}
