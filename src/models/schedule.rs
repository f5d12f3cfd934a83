use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::schedule_entries;

/// Cron-style recurrence using the five classic fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrontabFields {
    pub minute: String,
    pub hour: String,
    pub day_of_week: String,
    pub day_of_month: String,
    pub month_of_year: String,
}

impl Default for CrontabFields {
    fn default() -> Self {
        Self {
            minute: "*".to_string(),
            hour: "*".to_string(),
            day_of_week: "*".to_string(),
            day_of_month: "*".to_string(),
            month_of_year: "*".to_string(),
        }
    }
}

impl CrontabFields {
    #[must_use]
    pub fn new(minute: &str, hour: &str, day_of_week: &str) -> Self {
        Self {
            minute: minute.to_string(),
            hour: hour.to_string(),
            day_of_week: day_of_week.to_string(),
            ..Self::default()
        }
    }

    /// Six-field expression (leading seconds) understood by the cron engine.
    #[must_use]
    pub fn to_cron_expression(&self) -> String {
        format!(
            "0 {} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month_of_year, self.day_of_week
        )
    }
}

impl fmt::Display for CrontabFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month_of_year, self.day_of_week
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cadence {
    Crontab(CrontabFields),
    /// Accepted in configuration but not schedulable; synchronization rejects it.
    Interval { every_seconds: u64 },
}

impl Cadence {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Crontab(_) => "crontab",
            Self::Interval { .. } => "interval",
        }
    }
}

/// Static schedule definition as written in configuration.
///
/// Synchronization reads these and writes its own rows; the definition
/// itself is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    pub name: String,
    pub job: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    /// Entry stops firing this many seconds after it was synchronized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_seconds: Option<u64>,
    pub cadence: Cadence,
    /// JSON object handed to the job as its arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

const fn default_enabled() -> bool {
    true
}

impl ScheduleDefinition {
    #[must_use]
    pub fn crontab(name: &str, job: &str, fields: CrontabFields) -> Self {
        Self {
            name: name.to_string(),
            job: job.to_string(),
            cadence: Cadence::Crontab(fields),
            enabled: true,
            args: None,
            queue: None,
            expires_seconds: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = Some(args);
        self
    }
}

/// Persisted schedule entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub id: i32,
    pub name: String,
    pub job: String,
    pub crontab: CrontabFields,
    pub enabled: bool,
    pub args: Option<serde_json::Value>,
    pub queue: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_enqueued_at: Option<DateTime<Utc>>,
    pub total_enqueued: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleEntry {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl TryFrom<schedule_entries::Model> for ScheduleEntry {
    type Error = anyhow::Error;

    fn try_from(model: schedule_entries::Model) -> Result<Self, Self::Error> {
        let args = model
            .args
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .with_context(|| format!("Schedule '{}' has unreadable args", model.name))?;

        Ok(Self {
            id: model.id,
            name: model.name,
            job: model.job,
            crontab: CrontabFields {
                minute: model.minute,
                hour: model.hour,
                day_of_week: model.day_of_week,
                day_of_month: model.day_of_month,
                month_of_year: model.month_of_year,
            },
            enabled: model.enabled,
            args,
            queue: model.queue,
            expires_at: model.expires_at,
            last_enqueued_at: model.last_enqueued_at,
            total_enqueued: model.total_enqueued,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
