pub mod api_observability;
pub mod app_config;
pub mod registry_worker;
pub mod storage;

pub use api_observability::{ApiConfig, LogFormat, LoggingConfig};
pub use app_config::AppConfig;
pub use registry_worker::{RegistryConfig, WorkerConfig};
pub use storage::{DedupConfig, StorageBackend, StorageConfig};
