pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::{FastgetsError, FastgetsResult};
pub use logging::init_logging;
pub use models::{
    DueJob, ErrorRecord, Job, JobDefinition, ProcessDescriptor, ScriptLog, Task, TaskCompletion,
    TaskState, Traceback,
};
pub use traits::*;
