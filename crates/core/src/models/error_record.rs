use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, timestamp_now, Traceback};

/// 任务执行失败记录，只追加，不修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub traceback: Traceback,
    pub source_host: String,
}

impl ErrorRecord {
    pub fn new(traceback: Traceback, source_host: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            created_at: timestamp_now(),
            traceback,
            source_host: source_host.into(),
        }
    }
}
