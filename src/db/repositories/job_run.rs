use crate::entities::{job_runs, prelude::*};
use crate::models::{JobRun, JobStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{debug, warn};

/// Fields supplied when a run is enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJobRun {
    pub id: String,
    pub job: String,
    pub args: serde_json::Value,
    pub queue: Option<String>,
    pub schedule_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct JobRunRepository {
    conn: DatabaseConnection,
}

impl JobRunRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, run: &NewJobRun) -> Result<()> {
        let active_model = job_runs::ActiveModel {
            id: Set(run.id.clone()),
            job: Set(run.job.clone()),
            args: Set(serde_json::to_string(&run.args)?),
            status: Set(JobStatus::Pending.as_str().to_string()),
            progress_current: Set(None),
            progress_total: Set(None),
            result: Set(None),
            error: Set(None),
            queue: Set(run.queue.clone()),
            schedule_name: Set(run.schedule_name.clone()),
            enqueued_at: Set(Utc::now()),
            started_at: Set(None),
            finished_at: Set(None),
            expires_at: Set(run.expires_at),
        };

        JobRuns::insert(active_model).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<JobRun>> {
        JobRuns::find_by_id(id.to_string())
            .one(&self.conn)
            .await?
            .map(JobRun::try_from)
            .transpose()
    }

    pub async fn list(&self, limit: u64) -> Result<Vec<JobRun>> {
        let rows = JobRuns::find()
            .order_by_desc(job_runs::Column::EnqueuedAt)
            .limit(limit)
            .all(&self.conn)
            .await?;
        rows.into_iter().map(JobRun::try_from).collect()
    }

    pub async fn count_by_status(&self, status: JobStatus) -> Result<u64> {
        let total = JobRuns::find()
            .filter(job_runs::Column::Status.eq(status.as_str()))
            .count(&self.conn)
            .await?;
        Ok(total)
    }

    /// Moves the oldest pending run to `running` and returns it.
    ///
    /// The transition is a conditional update on `status = pending`, so when
    /// two workers race for the same row only one of them sees a changed row.
    pub async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<JobRun>> {
        loop {
            let Some(candidate) = JobRuns::find()
                .filter(job_runs::Column::Status.eq(JobStatus::Pending.as_str()))
                .order_by_asc(job_runs::Column::EnqueuedAt)
                .order_by_asc(job_runs::Column::Id)
                .one(&self.conn)
                .await?
            else {
                return Ok(None);
            };

            if candidate.expires_at.is_some_and(|at| at <= now) {
                let expired = self
                    .transition(
                        &candidate.id,
                        JobStatus::Pending,
                        JobStatus::Failed,
                        Some("expired"),
                        now,
                    )
                    .await?;
                if expired {
                    warn!(run_id = %candidate.id, job = %candidate.job, "Discarded expired job run");
                }
                continue;
            }

            let res = JobRuns::update_many()
                .col_expr(
                    job_runs::Column::Status,
                    Expr::value(JobStatus::Running.as_str()),
                )
                .col_expr(job_runs::Column::StartedAt, Expr::value(now))
                .filter(job_runs::Column::Id.eq(candidate.id.as_str()))
                .filter(job_runs::Column::Status.eq(JobStatus::Pending.as_str()))
                .exec(&self.conn)
                .await?;

            if res.rows_affected == 1 {
                return self.get(&candidate.id).await;
            }
            debug!(run_id = %candidate.id, "Lost claim race, retrying");
        }
    }

    pub async fn cancel(&self, id: &str) -> Result<bool> {
        self.transition(id, JobStatus::Pending, JobStatus::Cancelled, None, Utc::now())
            .await
    }

    /// Records progress for a running run. Never moves progress backwards.
    pub async fn update_progress(&self, id: &str, current: u32, total: u32) -> Result<bool> {
        let current = i32::try_from(current)?;
        let total = i32::try_from(total)?;

        let res = JobRuns::update_many()
            .col_expr(job_runs::Column::ProgressCurrent, Expr::value(current))
            .col_expr(job_runs::Column::ProgressTotal, Expr::value(total))
            .filter(job_runs::Column::Id.eq(id))
            .filter(job_runs::Column::Status.eq(JobStatus::Running.as_str()))
            .filter(
                Condition::any()
                    .add(job_runs::Column::ProgressCurrent.is_null())
                    .add(job_runs::Column::ProgressCurrent.lte(current)),
            )
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected == 1)
    }

    pub async fn complete(&self, id: &str, result: &serde_json::Value) -> Result<bool> {
        let res = JobRuns::update_many()
            .col_expr(
                job_runs::Column::Status,
                Expr::value(JobStatus::Succeeded.as_str()),
            )
            .col_expr(
                job_runs::Column::Result,
                Expr::value(serde_json::to_string(result)?),
            )
            .col_expr(job_runs::Column::FinishedAt, Expr::value(Utc::now()))
            .filter(job_runs::Column::Id.eq(id))
            .filter(job_runs::Column::Status.eq(JobStatus::Running.as_str()))
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected == 1)
    }

    pub async fn fail(&self, id: &str, error: &str) -> Result<bool> {
        self.transition(
            id,
            JobStatus::Running,
            JobStatus::Failed,
            Some(error),
            Utc::now(),
        )
        .await
    }

    /// Fails every run left `running`, e.g. by a process that died mid-job.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let res = JobRuns::update_many()
            .col_expr(
                job_runs::Column::Status,
                Expr::value(JobStatus::Failed.as_str()),
            )
            .col_expr(job_runs::Column::Error, Expr::value("interrupted"))
            .col_expr(job_runs::Column::FinishedAt, Expr::value(Utc::now()))
            .filter(job_runs::Column::Status.eq(JobStatus::Running.as_str()))
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected)
    }

    async fn transition(
        &self,
        id: &str,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut update = JobRuns::update_many()
            .col_expr(job_runs::Column::Status, Expr::value(to.as_str()))
            .col_expr(job_runs::Column::FinishedAt, Expr::value(at));

        if let Some(error) = error {
            update = update.col_expr(job_runs::Column::Error, Expr::value(error));
        }

        let res = update
            .filter(job_runs::Column::Id.eq(id))
            .filter(job_runs::Column::Status.eq(from.as_str()))
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected == 1)
    }
}
