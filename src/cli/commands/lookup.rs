//! Lookup command handler

use crate::config::Config;
use crate::services::WeatherError;
use crate::state::SharedState;

pub async fn cmd_lookup(config: Config, city: &str, country: Option<&str>) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    let outcome = match state.weather_service.lookup(city, country).await {
        Ok(outcome) => outcome,
        Err(WeatherError::InvalidInput(msg)) => {
            println!("{}", msg);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let record = &outcome.record;
    let place = record
        .country
        .as_deref()
        .map_or_else(|| record.city.clone(), |c| format!("{}, {}", record.city, c));

    println!("{} (record #{})", place, record.id);
    println!("{:-<50}", "");
    println!("  {:.1}°C, {}", record.temperature, record.description);
    println!(
        "  Humidity: {}% | Wind: {:.1} m/s | Pressure: {} hPa",
        record.humidity, record.wind_speed, record.pressure
    );
    println!("  Observed: {}", record.observed_at);

    if let Some(job_id) = &outcome.job_id {
        println!();
        println!("Search processing queued as job {}", job_id);
    }

    Ok(())
}
