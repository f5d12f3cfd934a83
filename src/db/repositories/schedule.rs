use crate::entities::{prelude::*, schedule_entries};
use crate::models::{CrontabFields, ScheduleEntry};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::warn;

/// Values written when an entry is created or replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntryInput {
    pub name: String,
    pub job: String,
    pub crontab: CrontabFields,
    pub enabled: bool,
    pub args: Option<serde_json::Value>,
    pub queue: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct ScheduleRepository {
    conn: DatabaseConnection,
}

impl ScheduleRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<ScheduleEntry>> {
        let row = ScheduleEntries::find()
            .filter(schedule_entries::Column::Name.eq(name))
            .one(&self.conn)
            .await?;
        row.map(ScheduleEntry::try_from).transpose()
    }

    pub async fn create(&self, input: &ScheduleEntryInput) -> Result<i32> {
        let now = Utc::now();
        let active_model = schedule_entries::ActiveModel {
            name: Set(input.name.clone()),
            job: Set(input.job.clone()),
            minute: Set(input.crontab.minute.clone()),
            hour: Set(input.crontab.hour.clone()),
            day_of_week: Set(input.crontab.day_of_week.clone()),
            day_of_month: Set(input.crontab.day_of_month.clone()),
            month_of_year: Set(input.crontab.month_of_year.clone()),
            enabled: Set(input.enabled),
            args: Set(encode_args(input.args.as_ref())?),
            queue: Set(input.queue.clone()),
            expires_at: Set(input.expires_at),
            last_enqueued_at: Set(None),
            total_enqueued: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let res = ScheduleEntries::insert(active_model)
            .exec(&self.conn)
            .await?;
        Ok(res.last_insert_id)
    }

    /// Overwrites the definition columns of an existing entry, keeping its
    /// enqueue bookkeeping.
    pub async fn update(&self, id: i32, input: &ScheduleEntryInput) -> Result<()> {
        let active_model = schedule_entries::ActiveModel {
            id: Set(id),
            job: Set(input.job.clone()),
            minute: Set(input.crontab.minute.clone()),
            hour: Set(input.crontab.hour.clone()),
            day_of_week: Set(input.crontab.day_of_week.clone()),
            day_of_month: Set(input.crontab.day_of_month.clone()),
            month_of_year: Set(input.crontab.month_of_year.clone()),
            enabled: Set(input.enabled),
            args: Set(encode_args(input.args.as_ref())?),
            queue: Set(input.queue.clone()),
            expires_at: Set(input.expires_at),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        active_model.update(&self.conn).await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<ScheduleEntry>> {
        let rows = ScheduleEntries::find()
            .order_by_asc(schedule_entries::Column::Name)
            .all(&self.conn)
            .await?;
        rows.into_iter().map(ScheduleEntry::try_from).collect()
    }

    pub async fn list_enabled(&self) -> Result<Vec<ScheduleEntry>> {
        let rows = ScheduleEntries::find()
            .filter(schedule_entries::Column::Enabled.eq(true))
            .order_by_asc(schedule_entries::Column::Name)
            .all(&self.conn)
            .await?;
        // One unreadable row must not keep the others from being scheduled.
        Ok(rows
            .into_iter()
            .filter_map(|row| match ScheduleEntry::try_from(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable schedule entry");
                    None
                }
            })
            .collect())
    }

    pub async fn record_enqueued(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        ScheduleEntries::update_many()
            .col_expr(schedule_entries::Column::LastEnqueuedAt, Expr::value(at))
            .col_expr(
                schedule_entries::Column::TotalEnqueued,
                Expr::col(schedule_entries::Column::TotalEnqueued).add(1),
            )
            .filter(schedule_entries::Column::Name.eq(name))
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}

fn encode_args(args: Option<&serde_json::Value>) -> Result<Option<String>> {
    Ok(args.map(serde_json::to_string).transpose()?)
}
