use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fastgets_core::models::{
    ErrorRecord, Job, ProcessDescriptor, ScriptLog, Task, TaskCompletion, TaskState, Traceback,
};
use fastgets_core::traits::{
    BitStore, ErrorRepository, JobRepository, ProcessRepository, RawPageRepository, ScriptFinish,
    ScriptLogRepository, TaskRepository,
};
use fastgets_core::{FastgetsError, FastgetsResult};
use tracing::debug;

/// 内存存储实现
///
/// 用一把互斥锁保护全部状态，每个仓储操作都在同一临界区内完成，
/// 因此与 Redis 实现具有相同的原子性语义。适用于测试和单进程调试。
/// 位数组的过期时间在内存实现中被忽略。
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    jobs: HashMap<String, Job>,
    job_names: HashMap<String, String>,
    tasks: HashMap<String, Task>,
    /// 排队中的任务，按 (入队时间, ID) 排序
    queued: BTreeSet<(DateTime<Utc>, String)>,
    /// 最新的在末尾
    errors: Vec<ErrorRecord>,
    script_logs: HashMap<String, ScriptLog>,
    processes: Vec<ProcessDescriptor>,
    raw_pages: HashMap<(String, String), Vec<u8>>,
    bits: HashMap<String, HashSet<u64>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> FastgetsResult<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| FastgetsError::Internal("in-memory store lock poisoned".to_string()))
    }

    /// 当前排队中的任务数量
    pub fn queued_len(&self) -> FastgetsResult<usize> {
        Ok(self.state()?.queued.len())
    }

    /// 全部任务数量
    pub fn task_count(&self) -> FastgetsResult<usize> {
        Ok(self.state()?.tasks.len())
    }
}

#[async_trait]
impl JobRepository for InMemoryStore {
    async fn replace(&self, job: &Job) -> FastgetsResult<Option<String>> {
        let mut state = self.state()?;
        let previous = state.job_names.insert(job.name.clone(), job.id.clone());
        if let Some(previous_id) = &previous {
            state.jobs.remove(previous_id);
        }
        state.jobs.insert(job.id.clone(), job.clone());
        Ok(previous)
    }

    async fn find_by_name(&self, name: &str) -> FastgetsResult<Option<Job>> {
        let state = self.state()?;
        Ok(state
            .job_names
            .get(name)
            .and_then(|id| state.jobs.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> FastgetsResult<Option<Job>> {
        Ok(self.state()?.jobs.get(id).cloned())
    }

    async fn delete_by_name(&self, name: &str) -> FastgetsResult<bool> {
        let mut state = self.state()?;
        match state.job_names.remove(name) {
            Some(id) => {
                state.jobs.remove(&id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, id: &str) -> FastgetsResult<bool> {
        let mut state = self.state()?;
        match state.jobs.remove(id) {
            Some(job) => {
                if state.job_names.get(&job.name).map(String::as_str) == Some(id) {
                    state.job_names.remove(&job.name);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> FastgetsResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self.state()?.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn insert(&self, task: &Task) -> FastgetsResult<()> {
        let mut state = self.state()?;
        if task.state == TaskState::Queued {
            state.queued.insert((task.enqueued_at, task.id.clone()));
        }
        state.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn claim_oldest(
        &self,
        instance_id: &str,
        started_at: DateTime<Utc>,
    ) -> FastgetsResult<Option<Task>> {
        let mut state = self.state()?;
        while let Some((_, id)) = state.queued.pop_first() {
            let Some(task) = state.tasks.get_mut(&id) else {
                debug!("skipping orphaned queue entry {}", id);
                continue;
            };
            if !task.state.can_transition_to(TaskState::Running) {
                continue;
            }
            task.state = TaskState::Running;
            task.instance_id = Some(instance_id.to_string());
            task.started_at = Some(started_at);
            return Ok(Some(task.clone()));
        }
        Ok(None)
    }

    async fn finish(
        &self,
        task_id: &str,
        completion: &TaskCompletion,
        finished_at: DateTime<Utc>,
    ) -> FastgetsResult<Option<Task>> {
        let mut state = self.state()?;
        let Some(task) = state.tasks.get_mut(task_id) else {
            return Ok(None);
        };
        let target = completion.target_state();
        if !task.state.can_transition_to(target) {
            return Ok(None);
        }
        task.state = target;
        task.finished_at = Some(finished_at);
        match completion {
            TaskCompletion::Done(result) => task.result = Some(result.clone()),
            TaskCompletion::Failed(traceback) => task.traceback = Some(traceback.clone()),
        }
        Ok(Some(task.clone()))
    }

    async fn get(&self, task_id: &str) -> FastgetsResult<Option<Task>> {
        Ok(self.state()?.tasks.get(task_id).cloned())
    }

    async fn list_for_instance(&self, instance_id: &str) -> FastgetsResult<Vec<Task>> {
        let state = self.state()?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| task.belongs_to(instance_id))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.claim_order().cmp(&b.claim_order()));
        Ok(tasks)
    }
}

#[async_trait]
impl ErrorRepository for InMemoryStore {
    async fn append(&self, record: &ErrorRecord) -> FastgetsResult<()> {
        self.state()?.errors.push(record.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> FastgetsResult<Vec<ErrorRecord>> {
        Ok(self
            .state()?
            .errors
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn clear(&self) -> FastgetsResult<u64> {
        let mut state = self.state()?;
        let removed = state.errors.len() as u64;
        state.errors.clear();
        Ok(removed)
    }
}

#[async_trait]
impl ScriptLogRepository for InMemoryStore {
    async fn insert(&self, log: &ScriptLog) -> FastgetsResult<()> {
        self.state()?.script_logs.insert(log.id.clone(), log.clone());
        Ok(())
    }

    async fn finish(
        &self,
        id: &str,
        end_at: DateTime<Utc>,
        traceback: Option<&Traceback>,
    ) -> FastgetsResult<ScriptFinish> {
        let mut state = self.state()?;
        let Some(log) = state.script_logs.get_mut(id) else {
            return Ok(ScriptFinish::NotFound);
        };
        if log.is_finished() {
            return Ok(ScriptFinish::AlreadyFinished(log.clone()));
        }
        log.end_at = Some(end_at);
        log.traceback = traceback.cloned();
        Ok(ScriptFinish::Finished(log.clone()))
    }

    async fn get(&self, id: &str) -> FastgetsResult<Option<ScriptLog>> {
        Ok(self.state()?.script_logs.get(id).cloned())
    }
}

#[async_trait]
impl ProcessRepository for InMemoryStore {
    async fn insert(&self, process: &ProcessDescriptor) -> FastgetsResult<()> {
        self.state()?.processes.push(process.clone());
        Ok(())
    }

    async fn list(&self) -> FastgetsResult<Vec<ProcessDescriptor>> {
        Ok(self.state()?.processes.clone())
    }
}

#[async_trait]
impl RawPageRepository for InMemoryStore {
    async fn put(&self, instance_id: &str, task_id: &str, body: &[u8]) -> FastgetsResult<()> {
        self.state()?
            .raw_pages
            .insert((instance_id.to_string(), task_id.to_string()), body.to_vec());
        Ok(())
    }

    async fn get(&self, instance_id: &str, task_id: &str) -> FastgetsResult<Option<Vec<u8>>> {
        Ok(self
            .state()?
            .raw_pages
            .get(&(instance_id.to_string(), task_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl BitStore for InMemoryStore {
    async fn test_and_set_bits(
        &self,
        key: &str,
        offsets: &[u64],
        _ttl: Option<Duration>,
    ) -> FastgetsResult<bool> {
        let mut state = self.state()?;
        let bits = state.bits.entry(key.to_string()).or_default();
        let mut all_present = true;
        for offset in offsets {
            if bits.insert(*offset) {
                all_present = false;
            }
        }
        Ok(all_present)
    }
}
