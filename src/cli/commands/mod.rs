mod export;
mod history;
mod jobs;
mod lookup;
mod run_job;
mod sync_schedules;

pub use export::cmd_export;
pub use history::cmd_history;
pub use jobs::{cmd_jobs_cancel, cmd_jobs_list, cmd_jobs_show};
pub use lookup::cmd_lookup;
pub use run_job::cmd_run_job;
pub use sync_schedules::cmd_sync_schedules;
