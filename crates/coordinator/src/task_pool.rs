use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, info};

use fastgets_core::models::{DueJob, Task, TaskCompletion, Traceback};
use fastgets_core::traits::TaskRepository;
use fastgets_core::{FastgetsError, FastgetsResult};

use crate::dedup_filter::{fingerprint, DedupFilter};
use crate::error_sink::ErrorSink;

/// 入队结果。重复提交不是错误。
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    Enqueued(Task),
    /// 去重过滤器判定已见过，没有创建任务
    Duplicate { fingerprint: String },
}

impl EnqueueOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, EnqueueOutcome::Duplicate { .. })
    }

    pub fn task(&self) -> Option<&Task> {
        match self {
            EnqueueOutcome::Enqueued(task) => Some(task),
            EnqueueOutcome::Duplicate { .. } => None,
        }
    }
}

/// 入队请求
#[derive(Debug, Clone)]
pub struct NewTask {
    pub job_name: String,
    pub payload: serde_json::Value,
    pub origin_instance: Option<String>,
    /// 为空时由任务名和参数推导
    pub dedup_key: Option<Vec<u8>>,
}

impl NewTask {
    pub fn new(job_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            job_name: job_name.into(),
            payload,
            origin_instance: None,
            dedup_key: None,
        }
    }

    /// 到期任务的一次触发，同一触发点在所有实例上得到相同的去重键
    pub fn from_due_job(due: &DueJob) -> Self {
        Self {
            job_name: due.job.name.clone(),
            payload: due.job.payload.clone(),
            origin_instance: None,
            dedup_key: Some(due.dedup_key()),
        }
    }

    pub fn with_origin(mut self, instance_id: impl Into<String>) -> Self {
        self.origin_instance = Some(instance_id.into());
        self
    }

    pub fn with_dedup_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    pub fn effective_dedup_key(&self) -> FastgetsResult<Vec<u8>> {
        match &self.dedup_key {
            Some(key) => Ok(key.clone()),
            None => default_dedup_key(&self.job_name, &self.payload),
        }
    }
}

/// `job_name || 0x00 || 规范化的 payload JSON`
pub fn default_dedup_key(job_name: &str, payload: &serde_json::Value) -> FastgetsResult<Vec<u8>> {
    let mut key = job_name.as_bytes().to_vec();
    key.push(0);
    write_canonical(payload, &mut key)?;
    Ok(key)
}

/// 对象键按字典序输出，与 serde_json 是否保留插入顺序无关
fn write_canonical(value: &serde_json::Value, out: &mut Vec<u8>) -> FastgetsResult<()> {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (i, (name, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend(serde_json::to_vec(name)?);
                out.push(b':');
                write_canonical(item, out)?;
            }
            out.push(b'}');
        }
        serde_json::Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        scalar => out.extend(serde_json::to_vec(scalar)?),
    }
    Ok(())
}

/// 共享任务池
///
/// 所有状态修改都由存储端原子完成，本结构本身不持有可变状态。
#[derive(Clone)]
pub struct TaskPool {
    tasks: Arc<dyn TaskRepository>,
    dedup: DedupFilter,
    sink: ErrorSink,
}

impl TaskPool {
    pub fn new(tasks: Arc<dyn TaskRepository>, dedup: DedupFilter, sink: ErrorSink) -> Self {
        Self { tasks, dedup, sink }
    }

    pub async fn enqueue(
        &self,
        job_name: &str,
        payload: serde_json::Value,
    ) -> FastgetsResult<EnqueueOutcome> {
        self.submit(NewTask::new(job_name, payload)).await
    }

    /// 先查询去重过滤器，命中时直接返回 `Duplicate`
    pub async fn submit(&self, new_task: NewTask) -> FastgetsResult<EnqueueOutcome> {
        let key = new_task.effective_dedup_key()?;
        let fingerprint = fingerprint(&key);

        if self.dedup.contains_or_add(&key).await? {
            counter!("fastgets_tasks_deduplicated_total").increment(1);
            debug!("重复任务已跳过: {} ({})", new_task.job_name, fingerprint);
            return Ok(EnqueueOutcome::Duplicate { fingerprint });
        }

        let task = Task::new(
            new_task.job_name,
            new_task.payload,
            fingerprint,
            new_task.origin_instance,
        );
        self.tasks.insert(&task).await?;

        counter!("fastgets_tasks_enqueued_total").increment(1);
        debug!("任务入队: {} ({})", task.id, task.job_name);
        Ok(EnqueueOutcome::Enqueued(task))
    }

    /// 取走最早入队的任务。同一任务最多被一个实例取走。
    pub async fn claim(&self, instance_id: &str) -> FastgetsResult<Option<Task>> {
        let claimed = self.tasks.claim_oldest(instance_id, Utc::now()).await?;
        if let Some(task) = &claimed {
            counter!("fastgets_tasks_claimed_total").increment(1);
            info!("实例 {} 认领任务 {} ({})", instance_id, task.id, task.job_name);
        }
        Ok(claimed)
    }

    pub async fn complete(&self, task_id: &str, result: serde_json::Value) -> FastgetsResult<Task> {
        let task = self
            .finish(task_id, TaskCompletion::Done(result))
            .await?;
        counter!("fastgets_tasks_completed_total").increment(1);
        info!("任务完成: {} ({})", task.id, task.job_name);
        Ok(task)
    }

    /// 置为失败并把错误链写入失败记录
    pub async fn fail(&self, task_id: &str, traceback: Traceback) -> FastgetsResult<Task> {
        let task = self
            .finish(task_id, TaskCompletion::Failed(traceback.clone()))
            .await?;
        counter!("fastgets_tasks_failed_total").increment(1);
        self.sink
            .report(traceback.with_context(format!("task {} ({})", task.id, task.job_name)))
            .await?;
        Ok(task)
    }

    async fn finish(&self, task_id: &str, completion: TaskCompletion) -> FastgetsResult<Task> {
        let target = completion.target_state();
        if let Some(task) = self.tasks.finish(task_id, &completion, Utc::now()).await? {
            return Ok(task);
        }

        // 条件更新未生效：任务不存在或不处于运行中
        let current = self.tasks.get(task_id).await?;
        Err(FastgetsError::InvalidTransition {
            id: task_id.to_string(),
            from: current.map(|task| task.state),
            to: target,
        })
    }

    /// 该实例认领的任务以及其入队且尚未被认领的任务
    pub async fn tasks_for_instance(&self, instance_id: &str) -> FastgetsResult<Vec<Task>> {
        self.tasks.list_for_instance(instance_id).await
    }

    pub async fn get(&self, task_id: &str) -> FastgetsResult<Task> {
        self.tasks
            .get(task_id)
            .await?
            .ok_or_else(|| FastgetsError::TaskNotFound {
                id: task_id.to_string(),
            })
    }
}
