use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, timestamp_now, Traceback};

/// 任务实例
///
/// 由任务池创建并持有，处于 `Queued`/`Running` 时归任务池所有；
/// 被某个 Worker 认领后，`payload` 的处理权转移给该 Worker。
///
/// # 字段说明
///
/// - `id`: 核心层生成的不透明ID，同时作为同一时刻入队任务的排序依据
/// - `job_name`: 所属任务定义名称，也用于查找执行器
/// - `origin_instance`: 入队该任务的 Worker 实例（手工入队时为空）
/// - `instance_id`: 认领该任务的 Worker 实例
/// - `fingerprint`: 去重键的 SHA-256 十六进制摘要
/// - `payload`: 任务参数，对任务池不透明
/// - `result` / `traceback`: 分别在 `Done` / `Failed` 时写入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub job_name: String,
    pub origin_instance: Option<String>,
    pub instance_id: Option<String>,
    pub state: TaskState,
    pub fingerprint: String,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub traceback: Option<Traceback>,
}

impl Task {
    pub fn new(
        job_name: impl Into<String>,
        payload: serde_json::Value,
        fingerprint: impl Into<String>,
        origin_instance: Option<String>,
    ) -> Self {
        Self {
            id: new_id(),
            job_name: job_name.into(),
            origin_instance,
            instance_id: None,
            state: TaskState::Queued,
            fingerprint: fingerprint.into(),
            enqueued_at: timestamp_now(),
            started_at: None,
            finished_at: None,
            payload,
            result: None,
            traceback: None,
        }
    }

    /// 是否属于指定 Worker 实例：由其认领，或由其入队且尚未被认领
    pub fn belongs_to(&self, instance_id: &str) -> bool {
        match &self.instance_id {
            Some(owner) => owner == instance_id,
            None => self.origin_instance.as_deref() == Some(instance_id),
        }
    }

    /// 认领排序键：先按入队时间，再按ID
    pub fn claim_order(&self) -> (DateTime<Utc>, &str) {
        (self.enqueued_at, self.id.as_str())
    }
}

/// 任务状态
///
/// 状态只能单调推进：`Queued -> Running -> Done | Failed`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskState {
    #[serde(rename = "QUEUED")]
    Queued,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "FAILED")]
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "QUEUED",
            TaskState::Running => "RUNNING",
            TaskState::Done => "DONE",
            TaskState::Failed => "FAILED",
        }
    }

    /// 状态只能单向推进：QUEUED → RUNNING → DONE/FAILED
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Queued, TaskState::Running)
                | (TaskState::Running, TaskState::Done)
                | (TaskState::Running, TaskState::Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(TaskState::Queued),
            "RUNNING" => Ok(TaskState::Running),
            "DONE" => Ok(TaskState::Done),
            "FAILED" => Ok(TaskState::Failed),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

/// 任务结束方式，由存储层在同一原子操作中写入
#[derive(Debug, Clone, PartialEq)]
pub enum TaskCompletion {
    Done(serde_json::Value),
    Failed(Traceback),
}

impl TaskCompletion {
    pub fn target_state(&self) -> TaskState {
        match self {
            TaskCompletion::Done(_) => TaskState::Done,
            TaskCompletion::Failed(_) => TaskState::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transitions_are_monotonic() {
        assert!(TaskState::Queued.can_transition_to(TaskState::Running));
        assert!(TaskState::Running.can_transition_to(TaskState::Done));
        assert!(TaskState::Running.can_transition_to(TaskState::Failed));

        assert!(!TaskState::Queued.can_transition_to(TaskState::Done));
        assert!(!TaskState::Done.can_transition_to(TaskState::Running));
        assert!(!TaskState::Failed.can_transition_to(TaskState::Done));
        assert!(!TaskState::Running.can_transition_to(TaskState::Queued));
    }

    #[test]
    fn state_round_trips_through_str() {
        for state in [
            TaskState::Queued,
            TaskState::Running,
            TaskState::Done,
            TaskState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<TaskState>().unwrap(), state);
        }
        assert!("PENDING".parse::<TaskState>().is_err());
    }

    #[test]
    fn queued_task_belongs_to_origin_until_claimed() {
        let mut task = Task::new("crawl", json!({}), "abc", Some("w1".to_string()));
        assert!(task.belongs_to("w1"));
        assert!(!task.belongs_to("w2"));

        task.instance_id = Some("w2".to_string());
        task.state = TaskState::Running;
        assert!(!task.belongs_to("w1"));
        assert!(task.belongs_to("w2"));
    }
}
