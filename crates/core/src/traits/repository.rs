//! 仓储接口定义
//!
//! 每类实体一个仓储，由 `fastgets-infrastructure` 提供 Redis 实现和内存实现。
//! 所有会修改共享状态的方法都必须在存储端原子完成：
//!
//! - [`JobRepository::replace`]：同名删除与新建在同一步完成
//! - [`TaskRepository::claim_oldest`]：取最早的排队任务并置为运行中
//! - [`TaskRepository::finish`]：仅当任务处于运行中时写入结束状态
//! - [`ScriptLogRepository::finish`]：仅当脚本日志尚未结束时写入结束时间
//!
//! 调用方不得用“先读后写”两次往返来组合这些操作。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ErrorRecord, Job, ProcessDescriptor, ScriptLog, Task, TaskCompletion, Traceback};
use crate::FastgetsResult;

/// 任务定义仓储
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 删除同名的旧定义并写入新定义，返回被替换掉的旧定义ID
    async fn replace(&self, job: &Job) -> FastgetsResult<Option<String>>;

    async fn find_by_name(&self, name: &str) -> FastgetsResult<Option<Job>>;

    async fn find_by_id(&self, id: &str) -> FastgetsResult<Option<Job>>;

    /// 返回是否确实删除了记录
    async fn delete_by_name(&self, name: &str) -> FastgetsResult<bool>;

    /// 返回是否确实删除了记录
    async fn delete_by_id(&self, id: &str) -> FastgetsResult<bool>;

    async fn list(&self) -> FastgetsResult<Vec<Job>>;
}

/// 任务仓储
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 写入一个排队中的任务
    async fn insert(&self, task: &Task) -> FastgetsResult<()>;

    /// 原子地取出最早入队的任务（同一时刻按ID排序），置为运行中并记录认领者
    async fn claim_oldest(
        &self,
        instance_id: &str,
        started_at: DateTime<Utc>,
    ) -> FastgetsResult<Option<Task>>;

    /// 仅当任务处于运行中时写入结束状态；否则不做任何修改并返回 `None`
    async fn finish(
        &self,
        task_id: &str,
        completion: &TaskCompletion,
        finished_at: DateTime<Utc>,
    ) -> FastgetsResult<Option<Task>>;

    async fn get(&self, task_id: &str) -> FastgetsResult<Option<Task>>;

    /// 指定实例认领的任务及其入队但尚未被认领的任务，按入队顺序
    async fn list_for_instance(&self, instance_id: &str) -> FastgetsResult<Vec<Task>>;
}

/// 失败记录仓储
#[async_trait]
pub trait ErrorRepository: Send + Sync {
    async fn append(&self, record: &ErrorRecord) -> FastgetsResult<()>;

    /// 最新的在前
    async fn list_recent(&self, limit: usize) -> FastgetsResult<Vec<ErrorRecord>>;

    /// 清空全部记录，返回删除条数
    async fn clear(&self) -> FastgetsResult<u64>;
}

/// [`ScriptLogRepository::finish`] 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptFinish {
    Finished(ScriptLog),
    AlreadyFinished(ScriptLog),
    NotFound,
}

/// 脚本运行记录仓储
#[async_trait]
pub trait ScriptLogRepository: Send + Sync {
    async fn insert(&self, log: &ScriptLog) -> FastgetsResult<()>;

    /// 仅当 `end_at` 尚未写入时写入 `end_at` 与 `traceback`
    async fn finish(
        &self,
        id: &str,
        end_at: DateTime<Utc>,
        traceback: Option<&Traceback>,
    ) -> FastgetsResult<ScriptFinish>;

    async fn get(&self, id: &str) -> FastgetsResult<Option<ScriptLog>>;
}

/// Worker 进程描述仓储
#[async_trait]
pub trait ProcessRepository: Send + Sync {
    async fn insert(&self, process: &ProcessDescriptor) -> FastgetsResult<()>;

    async fn list(&self) -> FastgetsResult<Vec<ProcessDescriptor>>;
}

/// 任务原始输出存储，内容对核心层不透明
#[async_trait]
pub trait RawPageRepository: Send + Sync {
    async fn put(&self, instance_id: &str, task_id: &str, body: &[u8]) -> FastgetsResult<()>;

    async fn get(&self, instance_id: &str, task_id: &str) -> FastgetsResult<Option<Vec<u8>>>;
}
