pub mod bit_store;
pub mod repository;

pub use bit_store::BitStore;
pub use repository::{
    ErrorRepository, JobRepository, ProcessRepository, RawPageRepository, ScriptFinish,
    ScriptLogRepository, TaskRepository,
};
