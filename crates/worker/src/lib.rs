pub mod backoff;
pub mod executor;
pub mod executor_registry;
pub mod executors;
pub mod runtime;

pub use executor::{Executor, TaskContext};
pub use executor_registry::ExecutorRegistry;
pub use executors::{HttpExecutor, HttpTaskParams, ShellExecutor, ShellTaskParams};
pub use runtime::{resolve_instance_id, IterationOutcome, WorkerRuntime, WorkerState};
