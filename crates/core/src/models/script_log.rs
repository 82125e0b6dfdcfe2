use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, timestamp_now, Traceback};

/// 脚本运行记录
///
/// 开始时创建（`end_at` 为空），结束时写入一次 `end_at` 与可选的
/// `traceback`，之后不再变化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptLog {
    pub id: String,
    pub name: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub traceback: Option<Traceback>,
}

impl ScriptLog {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            start_at: timestamp_now(),
            end_at: None,
            traceback: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_at.is_some()
    }
}
