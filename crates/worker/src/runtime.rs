use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use fastgets_coordinator::{EnqueueOutcome, JobRegistry, NewTask, Services, TaskPool};
use fastgets_core::config::WorkerConfig;
use fastgets_core::models::{Task, Traceback};
use fastgets_core::traits::RawPageRepository;
use fastgets_core::{FastgetsError, FastgetsResult};

use crate::backoff::Backoff;
use crate::executor::TaskContext;
use crate::executor_registry::ExecutorRegistry;

/// Worker 所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Polling,
    Executing,
    Reporting,
}

/// 单次循环的结果
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// 任务池为空
    Idle,
    Completed(Task),
    Failed(Task),
    /// 结果未能写回（例如任务已被其他方结束），已记录日志
    Unreported { task_id: String },
}

/// Worker 主循环
///
/// 每次循环：检查停止信号，把到期任务入队，认领一个任务，执行并写回结果。
/// 执行失败（包括 panic）只会让该任务失败；只有存储不可达会让 [`WorkerRuntime::run`] 返回错误。
pub struct WorkerRuntime {
    instance_id: String,
    registry: JobRegistry,
    pool: TaskPool,
    raw_pages: Arc<dyn RawPageRepository>,
    executors: Arc<ExecutorRegistry>,
    backoff: Backoff,
    state: watch::Sender<WorkerState>,
}

impl WorkerRuntime {
    pub fn new(
        instance_id: impl Into<String>,
        services: &Services,
        executors: ExecutorRegistry,
        config: &WorkerConfig,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            instance_id: instance_id.into(),
            registry: services.registry.clone(),
            pool: services.pool.clone(),
            raw_pages: services.raw_pages.clone(),
            executors: Arc::new(executors),
            backoff: Backoff::new(config.poll_interval(), config.max_backoff()),
            state,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }

    /// 运行直到收到停止信号或遇到致命错误
    ///
    /// 停止信号只在每次循环开始时检查，正在执行的任务总会执行完并写回结果；
    /// 任务池为空时的退避等待可被停止信号打断。
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> FastgetsResult<()> {
        info!("Worker {} 启动", self.instance_id);

        loop {
            match shutdown.try_recv() {
                Err(broadcast::error::TryRecvError::Empty) => {}
                _ => {
                    info!("Worker {} 收到停止信号", self.instance_id);
                    break;
                }
            }

            let idle = match self.run_once_at(Utc::now()).await {
                Ok(IterationOutcome::Idle) => true,
                Ok(_) => false,
                Err(e) if e.is_fatal() => {
                    error!("Worker {} 遇到致命错误，退出: {}", self.instance_id, e);
                    self.set_state(WorkerState::Idle);
                    return Err(e);
                }
                Err(e) => {
                    error!("Worker {} 本次循环失败: {}", self.instance_id, e);
                    true
                }
            };

            if idle {
                let delay = self.backoff.next_delay();
                debug!("任务池为空，等待 {:?}", delay);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.recv() => {
                        info!("Worker {} 在等待期间收到停止信号", self.instance_id);
                        break;
                    }
                }
            } else {
                self.backoff.reset();
            }
        }

        self.set_state(WorkerState::Idle);
        info!("Worker {} 已停止", self.instance_id);
        Ok(())
    }

    /// 以给定时间执行一次循环（不检查停止信号，不等待）
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> FastgetsResult<IterationOutcome> {
        self.set_state(WorkerState::Polling);
        let polled = self.poll(now).await;
        let task = match polled {
            Ok(Some(task)) => task,
            Ok(None) => {
                self.set_state(WorkerState::Idle);
                return Ok(IterationOutcome::Idle);
            }
            Err(e) => {
                self.set_state(WorkerState::Idle);
                return Err(e);
            }
        };

        self.set_state(WorkerState::Executing);
        let execution = self.execute(&task).await;

        self.set_state(WorkerState::Reporting);
        let reported = match execution {
            Ok(result) => self
                .pool
                .complete(&task.id, result)
                .await
                .map(IterationOutcome::Completed),
            Err(traceback) => self
                .pool
                .fail(&task.id, traceback)
                .await
                .map(IterationOutcome::Failed),
        };
        self.set_state(WorkerState::Idle);

        match reported {
            Ok(outcome) => Ok(outcome),
            Err(e @ FastgetsError::InvalidTransition { .. }) => {
                warn!("任务结果未写回: {}", e);
                Ok(IterationOutcome::Unreported { task_id: task.id })
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!("写回任务 {} 结果失败: {}", task.id, e);
                Ok(IterationOutcome::Unreported { task_id: task.id })
            }
        }
    }

    async fn poll(&self, now: DateTime<Utc>) -> FastgetsResult<Option<Task>> {
        self.enqueue_due_jobs(now).await?;
        self.pool.claim(&self.instance_id).await
    }

    async fn enqueue_due_jobs(&self, now: DateTime<Utc>) -> FastgetsResult<()> {
        for due in self.registry.due_jobs(now).await? {
            let new_task = NewTask::from_due_job(&due).with_origin(self.instance_id.clone());
            match self.pool.submit(new_task).await? {
                EnqueueOutcome::Enqueued(task) => info!(
                    "到期任务入队: {} @ {} -> {}",
                    due.job.name, due.fire_at, task.id
                ),
                EnqueueOutcome::Duplicate { fingerprint } => debug!(
                    "到期任务已由其他实例入队: {} @ {} ({})",
                    due.job.name, due.fire_at, fingerprint
                ),
            }
        }
        Ok(())
    }

    /// 执行边界：错误与 panic 都在这里转为失败现场
    async fn execute(&self, task: &Task) -> Result<serde_json::Value, Traceback> {
        let Some(executor) = self.executors.resolve(task) else {
            return Err(Traceback::new(vec![format!(
                "没有可用的执行器: job_name={}",
                task.job_name
            )]));
        };

        let ctx = TaskContext::new(task.clone(), self.instance_id.clone(), self.raw_pages.clone());
        debug!("使用执行器 {} 执行任务 {}", executor.name(), task.id);

        match AssertUnwindSafe(executor.execute(&ctx)).catch_unwind().await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(Traceback::from_error(&e)),
            Err(panic) => {
                error!("执行器 {} 在任务 {} 中 panic", executor.name(), task.id);
                Err(Traceback::from_panic(panic.as_ref()))
            }
        }
    }
}

/// 配置中未指定时使用 `主机名-进程号`
pub fn resolve_instance_id(config: &WorkerConfig) -> String {
    config.instance_id.clone().unwrap_or_else(|| {
        format!(
            "{}-{}",
            fastgets_coordinator::local_hostname(),
            std::process::id()
        )
    })
}
