use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::WeatherProvider;
use crate::db::{RecordFilter, RecordOrder, Store};
use crate::jobs::JobRequest;
use crate::models::{CityQuery, ForecastData, WeatherRecord};
use crate::services::queue::{EnqueueOptions, JobQueue};
use crate::services::retry::{RetryPolicy, with_retry};
use crate::services::weather_service::{
    LookupOutcome, WeatherError, WeatherService, normalize_city, validate_limit,
};

pub struct DefaultWeatherService {
    store: Store,
    provider: Arc<dyn WeatherProvider>,
    queue: JobQueue,
    retry: RetryPolicy,
}

impl DefaultWeatherService {
    #[must_use]
    pub fn new(
        store: Store,
        provider: Arc<dyn WeatherProvider>,
        queue: JobQueue,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            provider,
            queue,
            retry,
        }
    }

    fn query_for(city: &str, country: Option<&str>) -> CityQuery {
        let query = CityQuery::new(city);
        match country.map(str::trim).filter(|c| !c.is_empty()) {
            Some(country) => query.with_country(country),
            None => query,
        }
    }
}

#[async_trait]
impl WeatherService for DefaultWeatherService {
    async fn lookup(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> Result<LookupOutcome, WeatherError> {
        let query = Self::query_for(normalize_city(city)?, country);

        let observation = with_retry(&self.retry, || self.provider.fetch_current(&query)).await?;
        let id = self.store.insert_record(&observation).await?;
        let record = self
            .store
            .get_record(id)
            .await?
            .ok_or_else(|| WeatherError::Database(format!("Record {id} vanished after insert")))?;

        let job_id = match self
            .queue
            .enqueue(
                &JobRequest::ProcessSearch {
                    city: record.city.clone(),
                },
                EnqueueOptions::default(),
            )
            .await
        {
            Ok(job_id) => Some(job_id),
            Err(e) => {
                warn!(city = %record.city, error = %e, "Failed to enqueue search processing");
                None
            }
        };

        info!(city = %record.city, record_id = record.id, "Weather lookup stored");
        Ok(LookupOutcome { record, job_id })
    }

    async fn forecast(&self, city: &str) -> Result<ForecastData, WeatherError> {
        let query = Self::query_for(normalize_city(city)?, None);
        Ok(with_retry(&self.retry, || self.provider.fetch_forecast(&query)).await?)
    }

    async fn history(&self, limit: Option<u64>) -> Result<Vec<WeatherRecord>, WeatherError> {
        let limit = validate_limit(limit)?;
        Ok(self
            .store
            .query_records(&RecordFilter::Any, RecordOrder::NewestFirst, Some(limit))
            .await?)
    }

    async fn get(&self, id: i64) -> Result<Option<WeatherRecord>, WeatherError> {
        Ok(self.store.get_record(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ProviderError;
    use crate::models::NewWeatherRecord;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with the given errors in order, then succeeds.
    struct ScriptedProvider {
        failures: Vec<ProviderError>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn fetch_current(
            &self,
            query: &CityQuery,
        ) -> Result<NewWeatherRecord, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            if let Some(err) = self.failures.get(n) {
                return Err(err.clone());
            }
            Ok(NewWeatherRecord {
                city: query.city.clone(),
                country: Some("GB".to_string()),
                temperature: 11.0,
                humidity: 80,
                wind_speed: 5.0,
                pressure: 1001,
                description: "drizzle".to_string(),
                icon: "09d".to_string(),
            })
        }

        async fn fetch_forecast(&self, _query: &CityQuery) -> Result<ForecastData, ProviderError> {
            Err(ProviderError::Transport("not scripted".to_string()))
        }
    }

    async fn service(failures: Vec<ProviderError>) -> (DefaultWeatherService, Arc<ScriptedProvider>) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let provider = Arc::new(ScriptedProvider {
            failures,
            calls: AtomicU32::new(0),
        });
        let queue = JobQueue::new(store.clone(), "default");
        let retry = RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        (
            DefaultWeatherService::new(store, provider.clone(), queue, retry),
            provider,
        )
    }

    #[tokio::test]
    async fn test_blank_city_is_invalid_input() {
        let (service, provider) = service(vec![]).await;
        let err = service.lookup("   ", None).await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidInput(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_stores_record_and_enqueues() {
        let (service, _) = service(vec![]).await;
        let outcome = service.lookup(" London ", None).await.unwrap();

        assert_eq!(outcome.record.city, "London");
        let job_id = outcome.job_id.unwrap();
        let run = service.queue.get(&job_id).await.unwrap().unwrap();
        assert_eq!(run.job, "process_search");

        let history = service.history(None).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_retries_transient_failure_once() {
        let (service, provider) =
            service(vec![ProviderError::Status {
                status: 502,
                message: "Bad Gateway".to_string(),
            }])
            .await;

        service.lookup("London", None).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lookup_surfaces_client_error_without_retry() {
        let not_found = ProviderError::Status {
            status: 404,
            message: "city not found".to_string(),
        };
        let (service, provider) = service(vec![not_found.clone()]).await;

        let err = service.lookup("Atlantis", None).await.unwrap_err();
        assert!(matches!(err, WeatherError::Provider(e) if e == not_found));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_limit_bounds() {
        let (service, _) = service(vec![]).await;
        assert!(service.history(Some(0)).await.is_err());
        assert!(service.history(Some(1001)).await.is_err());
        assert!(service.history(Some(1000)).await.is_ok());
        assert!(service.get(42).await.unwrap().is_none());
    }
}
