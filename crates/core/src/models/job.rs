use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, timestamp_now};

/// 周期任务定义
///
/// 以 `name` 唯一标识。重复添加同名任务时，旧定义会被删除并以新的 `id`
/// 与 `created_at` 重新创建，而不是原地更新字段。
///
/// # 字段说明
///
/// - `id`: 核心层生成的不透明ID
/// - `name`: 任务名称（唯一）
/// - `trigger`: cron 表达式，原样保存（5字段或带秒的6/7字段）
/// - `enabled`: 是否参与调度
/// - `payload`: 触发时传给任务的参数
/// - `created_at`: 创建时间，早于该时间的触发点不会被补发
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub trigger: String,
    pub enabled: bool,
    #[serde(default = "empty_payload")]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

fn empty_payload() -> serde_json::Value {
    serde_json::json!({})
}

impl Job {
    pub fn from_definition(definition: JobDefinition) -> Self {
        Self {
            id: new_id(),
            name: definition.name,
            trigger: definition.trigger,
            enabled: definition.enabled,
            payload: definition.payload,
            created_at: timestamp_now(),
        }
    }
}

/// 创建/替换任务定义的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub trigger: String,
    pub enabled: bool,
    pub payload: serde_json::Value,
}

impl JobDefinition {
    pub fn new(name: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trigger: trigger.into(),
            enabled: true,
            payload: empty_payload(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// 到期的任务定义及其本次触发时间
#[derive(Debug, Clone, PartialEq)]
pub struct DueJob {
    pub job: Job,
    pub fire_at: DateTime<Utc>,
}

impl DueJob {
    /// 本次触发的去重键。同一任务的同一触发点在所有Worker上得到相同的键。
    pub fn dedup_key(&self) -> Vec<u8> {
        format!("cron:{}:{}", self.job.name, self.fire_at.to_rfc3339()).into_bytes()
    }
}
