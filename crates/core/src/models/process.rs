use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, timestamp_now};

/// Worker 进程描述，仅作元数据登记，不参与任务池
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    pub id: String,
    pub name: String,
    pub process_type: String,
    pub created_at: DateTime<Utc>,
}

impl ProcessDescriptor {
    pub fn new(name: impl Into<String>, process_type: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            process_type: process_type.into(),
            created_at: timestamp_now(),
        }
    }
}
