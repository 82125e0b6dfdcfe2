use std::sync::Arc;

use async_trait::async_trait;
use fastgets_core::models::Task;
use fastgets_core::traits::RawPageRepository;

/// 单个任务的执行上下文
#[derive(Clone)]
pub struct TaskContext {
    pub task: Task,
    pub instance_id: String,
    raw_pages: Arc<dyn RawPageRepository>,
}

impl TaskContext {
    pub fn new(task: Task, instance_id: impl Into<String>, raw_pages: Arc<dyn RawPageRepository>) -> Self {
        Self {
            task,
            instance_id: instance_id.into(),
            raw_pages,
        }
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.task.payload
    }

    /// 保存任务的原始输出，可通过 `/task/page_raw` 读取
    pub async fn save_raw_page(&self, body: &[u8]) -> anyhow::Result<()> {
        self.raw_pages
            .put(&self.instance_id, &self.task.id, body)
            .await?;
        Ok(())
    }
}

/// 任务执行器
///
/// 返回的错误和执行中的 panic 都会被 Worker 捕获并转为任务失败，不会中断 Worker 循环。
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<serde_json::Value>;
}
