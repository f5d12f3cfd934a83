use crate::config::Config;
use crate::db::Store;
use crate::services::{SyncAction, SyncMode, sync_schedules};

pub async fn cmd_sync_schedules(config: &Config, mode: SyncMode) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let report = sync_schedules(&store, &config.schedules, mode).await;

    if report.dry_run {
        println!("Dry run, nothing written.");
    }

    for entry in &report.entries {
        let marker = match entry.action {
            SyncAction::Created => "+",
            SyncAction::Updated => "~",
            SyncAction::Skipped => "=",
        };
        println!("{} {}", marker, entry.name);
    }

    for error in &report.errors {
        println!("✗ {}: {}", error.name, error.error);
    }

    println!();
    println!(
        "created {}, updated {}, skipped {}, rejected {}",
        report.created,
        report.updated,
        report.skipped,
        report.errors.len()
    );

    Ok(())
}
