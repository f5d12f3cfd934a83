use anyhow::Context;
use std::path::Path;

use crate::config::Config;
use crate::db::Store;
use crate::jobs::ExportFormat;
use crate::jobs::export::export_all;

pub async fn cmd_export(
    config: &Config,
    format: ExportFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let (data, records_count) = export_all(&store, format).await?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &data)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "✓ Exported {} records as {} to {}",
                records_count,
                format.as_str(),
                path.display()
            );
        }
        None => println!("{}", data),
    }

    Ok(())
}
