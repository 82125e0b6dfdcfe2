pub mod error_record;
pub mod job;
pub mod process;
pub mod script_log;
pub mod task;
pub mod traceback;

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

pub use error_record::ErrorRecord;
pub use job::{DueJob, Job, JobDefinition};
pub use process::ProcessDescriptor;
pub use script_log::ScriptLog;
pub use task::{Task, TaskCompletion, TaskState};
pub use traceback::Traceback;

/// 生成由核心层分配的不透明ID（与存储后端无关）
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 当前时间，截断到微秒。所有后端都以微秒精度排序，截断后比较结果一致。
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
