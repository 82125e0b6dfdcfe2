use thiserror::Error;

use crate::models::TaskState;

/// fastgets 统一错误类型
#[derive(Debug, Error)]
pub enum FastgetsError {
    /// 共享存储不可达或命令失败。Worker 循环遇到此错误时直接退出。
    #[error("存储错误: {0}")]
    Storage(String),

    #[error("无效的触发表达式: '{expr}' - {message}")]
    InvalidTrigger { expr: String, message: String },

    #[error("任务定义未找到: {name}")]
    JobNotFound { name: String },

    #[error("任务未找到: {id}")]
    TaskNotFound { id: String },

    #[error("脚本日志未找到: {id}")]
    ScriptLogNotFound { id: String },

    /// `from` 为 None 表示任务不存在
    #[error(
        "非法的任务状态迁移: {id} ({} -> {to})",
        .from.map(|s| s.as_str()).unwrap_or("不存在")
    )]
    InvalidTransition {
        id: String,
        from: Option<TaskState>,
        to: TaskState,
    },

    #[error("脚本日志已结束: {id}")]
    AlreadyFinished { id: String },

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl FastgetsError {
    /// 是否为致命错误（共享服务不可达，Worker 无法继续推进）
    pub fn is_fatal(&self) -> bool {
        matches!(self, FastgetsError::Storage(_))
    }

    pub fn storage(message: impl Into<String>) -> Self {
        FastgetsError::Storage(message.into())
    }
}

impl From<serde_json::Error> for FastgetsError {
    fn from(e: serde_json::Error) -> Self {
        FastgetsError::Serialization(e.to_string())
    }
}

impl From<chrono::ParseError> for FastgetsError {
    fn from(e: chrono::ParseError) -> Self {
        FastgetsError::Serialization(format!("时间格式错误: {e}"))
    }
}

/// 统一的Result类型
pub type FastgetsResult<T> = std::result::Result<T, FastgetsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_errors_are_fatal() {
        assert!(FastgetsError::storage("connection refused").is_fatal());
        assert!(!FastgetsError::InvalidTransition {
            id: "t1".to_string(),
            from: Some(TaskState::Done),
            to: TaskState::Done,
        }
        .is_fatal());
        assert!(!FastgetsError::AlreadyFinished {
            id: "s1".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn serde_errors_convert_to_serialization() {
        let err: FastgetsError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, FastgetsError::Serialization(_)));
    }
}
