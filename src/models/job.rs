use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::entities::job_runs;

/// Lifecycle of a queued job invocation.
///
/// `Pending -> Running -> {Succeeded, Failed}`, or `Pending -> Cancelled`
/// when withdrawn before a worker picks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
}

/// A job invocation as stored in the work queue.
#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    pub id: String,
    pub job: String,
    pub args: serde_json::Value,
    pub status: JobStatus,
    pub progress: Option<Progress>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub queue: Option<String>,
    pub schedule_name: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<job_runs::Model> for JobRun {
    type Error = anyhow::Error;

    fn try_from(model: job_runs::Model) -> Result<Self, Self::Error> {
        let status = model
            .status
            .parse::<JobStatus>()
            .map_err(anyhow::Error::msg)?;

        let progress = match (model.progress_current, model.progress_total) {
            (Some(current), Some(total)) => Some(Progress {
                current: u32::try_from(current).unwrap_or(0),
                total: u32::try_from(total).unwrap_or(0),
            }),
            _ => None,
        };

        let args = serde_json::from_str(&model.args)
            .with_context(|| format!("Job run {} has unreadable args", model.id))?;
        let result = model
            .result
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Self {
            id: model.id,
            job: model.job,
            args,
            status,
            progress,
            result,
            error: model.error,
            queue: model.queue,
            schedule_name: model.schedule_name,
            enqueued_at: model.enqueued_at,
            started_at: model.started_at,
            finished_at: model.finished_at,
            expires_at: model.expires_at,
        })
    }
}
