pub mod queue;
pub use queue::{EnqueueOptions, JobQueue, QueueError, RunProgress};

pub mod retry;
pub use retry::{RetryPolicy, with_retry};

pub mod schedule_sync;
pub use schedule_sync::{SyncAction, SyncMode, SyncReport, sync_schedules};

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod workers;
pub use workers::WorkerPool;

pub mod weather_service;
pub mod weather_service_impl;
pub use weather_service::{LookupOutcome, WeatherError, WeatherService};
pub use weather_service_impl::DefaultWeatherService;
