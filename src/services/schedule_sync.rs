//! Reconciles configured schedule definitions with persisted entries.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tokio_cron_scheduler::Job;
use tracing::{info, warn};

use crate::db::{ScheduleEntryInput, Store};
use crate::jobs::JobRequest;
use crate::models::{Cadence, ScheduleDefinition};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncMode {
    /// Overwrite entries that already exist instead of skipping them.
    pub replace: bool,
    /// Compute the plan without writing anything.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEntry {
    pub name: String,
    pub action: SyncAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEntryError {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub dry_run: bool,
    pub entries: Vec<SyncEntry>,
    pub errors: Vec<SyncEntryError>,
}

impl SyncReport {
    fn record(&mut self, name: &str, action: SyncAction) {
        match action {
            SyncAction::Created => self.created += 1,
            SyncAction::Updated => self.updated += 1,
            SyncAction::Skipped => self.skipped += 1,
        }
        self.entries.push(SyncEntry {
            name: name.to_string(),
            action,
        });
    }

    fn reject(&mut self, name: &str, error: impl Into<String>) {
        let error = error.into();
        warn!(schedule = name, error = %error, "Schedule entry rejected");
        self.errors.push(SyncEntryError {
            name: name.to_string(),
            error,
        });
    }
}

/// Checks a definition and turns it into the row that would be written.
fn prepare(definition: &ScheduleDefinition) -> Result<ScheduleEntryInput, String> {
    let crontab = match &definition.cadence {
        Cadence::Crontab(fields) => fields.clone(),
        other => {
            return Err(format!(
                "Unsupported cadence '{}': only crontab schedules can be synchronized",
                other.kind()
            ));
        }
    };

    let args = match &definition.args {
        None => serde_json::json!({}),
        Some(value) if value.is_object() => value.clone(),
        Some(_) => return Err("Schedule args must be a JSON object".to_string()),
    };
    JobRequest::from_parts(&definition.job, &args).map_err(|e| e.to_string())?;

    let expression = crontab.to_cron_expression();
    Job::new(expression.as_str(), |_uuid, _lock| {})
        .map_err(|e| format!("Invalid crontab '{crontab}': {e}"))?;

    let expires_at = match definition.expires_seconds {
        Some(seconds) => {
            let seconds = i64::try_from(seconds).map_err(|_| "Expiry is too large".to_string())?;
            Some(Utc::now() + Duration::seconds(seconds))
        }
        None => None,
    };

    Ok(ScheduleEntryInput {
        name: definition.name.clone(),
        job: definition.job.clone(),
        crontab,
        enabled: definition.enabled,
        args: definition.args.clone(),
        queue: definition.queue.clone(),
        expires_at,
    })
}

/// Creates missing entries and, in replace mode, overwrites existing ones.
///
/// Each definition is handled on its own: a rejected or failing entry is
/// reported in [`SyncReport::errors`] and the remaining ones still sync.
pub async fn sync_schedules(
    store: &Store,
    definitions: &[ScheduleDefinition],
    mode: SyncMode,
) -> SyncReport {
    let mut report = SyncReport {
        dry_run: mode.dry_run,
        ..SyncReport::default()
    };
    let mut seen = HashSet::new();

    for definition in definitions {
        let name = definition.name.as_str();

        if !seen.insert(name) {
            report.reject(name, "Duplicate schedule name");
            continue;
        }

        let input = match prepare(definition) {
            Ok(input) => input,
            Err(e) => {
                report.reject(name, e);
                continue;
            }
        };

        let existing = match store.get_schedule(name).await {
            Ok(existing) => existing,
            Err(e) => {
                report.reject(name, e.to_string());
                continue;
            }
        };

        let action = match existing {
            None if mode.dry_run => SyncAction::Created,
            None => match store.create_schedule(&input).await {
                Ok(_) => SyncAction::Created,
                Err(e) => {
                    report.reject(name, e.to_string());
                    continue;
                }
            },
            Some(_) if !mode.replace => SyncAction::Skipped,
            Some(_) if mode.dry_run => SyncAction::Updated,
            Some(entry) => match store.update_schedule(entry.id, &input).await {
                Ok(()) => SyncAction::Updated,
                Err(e) => {
                    report.reject(name, e.to_string());
                    continue;
                }
            },
        };

        report.record(name, action);
    }

    info!(
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        errors = report.errors.len(),
        dry_run = mode.dry_run,
        "Schedule synchronization finished"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrontabFields;

    #[test]
    fn test_prepare_rejects_interval_cadence() {
        let mut def =
            ScheduleDefinition::crontab("tick", "send_alerts", CrontabFields::new("0", "*", "*"));
        def.cadence = Cadence::Interval { every_seconds: 60 };
        let err = prepare(&def).unwrap_err();
        assert!(err.contains("interval"));
    }

    #[test]
    fn test_prepare_rejects_bad_crontab() {
        let def = ScheduleDefinition::crontab(
            "broken",
            "cleanup",
            CrontabFields::new("99", "*", "*"),
        );
        assert!(prepare(&def).is_err());
    }

    #[test]
    fn test_prepare_rejects_unknown_job_and_bad_args() {
        let def =
            ScheduleDefinition::crontab("mystery", "make_coffee", CrontabFields::new("0", "*", "*"));
        assert!(prepare(&def).is_err());

        let def = ScheduleDefinition::crontab("export", "export_data", CrontabFields::default())
            .with_args(serde_json::json!(["csv"]));
        assert!(prepare(&def).is_err());
    }

    #[test]
    fn test_default_schedules_are_valid() {
        for def in crate::config::default_schedules() {
            assert!(prepare(&def).is_ok(), "{}", def.name);
        }
    }
}
