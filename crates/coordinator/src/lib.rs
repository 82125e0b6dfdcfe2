pub mod cron_utils;
pub mod dedup_filter;
pub mod error_sink;
pub mod job_registry;
pub mod process_registry;
pub mod services;
pub mod task_pool;

pub use cron_utils::CronTrigger;
pub use dedup_filter::{fingerprint, DedupFilter};
pub use error_sink::{local_hostname, ErrorSink, DEFAULT_ERROR_LIST_LIMIT};
pub use job_registry::{DueJobs, JobRegistry};
pub use process_registry::ProcessRegistry;
pub use services::Services;
pub use task_pool::{default_dedup_key, EnqueueOutcome, NewTask, TaskPool};
