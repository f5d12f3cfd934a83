use crate::config::Config;
use crate::db::{RecordFilter, RecordOrder, Store};

pub async fn cmd_history(config: &Config, limit: u64) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let records = store
        .query_records(&RecordFilter::Any, RecordOrder::NewestFirst, Some(limit))
        .await?;

    if records.is_empty() {
        println!("No lookups recorded yet.");
        return Ok(());
    }

    println!("Recent Lookups (last {}):", records.len());
    println!("{:-<70}", "");

    for record in records {
        let country = record.country.as_deref().unwrap_or("??");
        println!(
            "• #{} {} ({}) {:.1}°C {}",
            record.id, record.city, country, record.temperature, record.description
        );
        println!("  {}", record.observed_at);
    }

    Ok(())
}
