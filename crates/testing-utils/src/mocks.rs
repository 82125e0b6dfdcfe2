//! Failure-mode stores for exercising error paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fastgets_core::models::{
    ErrorRecord, Job, ProcessDescriptor, ScriptLog, Task, TaskCompletion, Traceback,
};
use fastgets_core::traits::{
    BitStore, ErrorRepository, JobRepository, ProcessRepository, RawPageRepository, ScriptFinish,
    ScriptLogRepository, TaskRepository,
};
use fastgets_core::{FastgetsError, FastgetsResult};
use fastgets_infrastructure::{InMemoryStore, StoreHandles};

/// A store that fails every call with a connectivity error
#[derive(Debug, Default, Clone)]
pub struct UnreachableStore;

impl UnreachableStore {
    pub fn handles() -> StoreHandles {
        StoreHandles::from_shared(Arc::new(UnreachableStore))
    }
}

fn unreachable<T>() -> FastgetsResult<T> {
    Err(FastgetsError::storage("connection refused"))
}

#[async_trait]
impl JobRepository for UnreachableStore {
    async fn replace(&self, _job: &Job) -> FastgetsResult<Option<String>> {
        unreachable()
    }
    async fn find_by_name(&self, _name: &str) -> FastgetsResult<Option<Job>> {
        unreachable()
    }
    async fn find_by_id(&self, _id: &str) -> FastgetsResult<Option<Job>> {
        unreachable()
    }
    async fn delete_by_name(&self, _name: &str) -> FastgetsResult<bool> {
        unreachable()
    }
    async fn delete_by_id(&self, _id: &str) -> FastgetsResult<bool> {
        unreachable()
    }
    async fn list(&self) -> FastgetsResult<Vec<Job>> {
        unreachable()
    }
}

#[async_trait]
impl TaskRepository for UnreachableStore {
    async fn insert(&self, _task: &Task) -> FastgetsResult<()> {
        unreachable()
    }
    async fn claim_oldest(
        &self,
        _instance_id: &str,
        _started_at: DateTime<Utc>,
    ) -> FastgetsResult<Option<Task>> {
        unreachable()
    }
    async fn finish(
        &self,
        _task_id: &str,
        _completion: &TaskCompletion,
        _finished_at: DateTime<Utc>,
    ) -> FastgetsResult<Option<Task>> {
        unreachable()
    }
    async fn get(&self, _task_id: &str) -> FastgetsResult<Option<Task>> {
        unreachable()
    }
    async fn list_for_instance(&self, _instance_id: &str) -> FastgetsResult<Vec<Task>> {
        unreachable()
    }
}

#[async_trait]
impl ErrorRepository for UnreachableStore {
    async fn append(&self, _record: &ErrorRecord) -> FastgetsResult<()> {
        unreachable()
    }
    async fn list_recent(&self, _limit: usize) -> FastgetsResult<Vec<ErrorRecord>> {
        unreachable()
    }
    async fn clear(&self) -> FastgetsResult<u64> {
        unreachable()
    }
}

#[async_trait]
impl ScriptLogRepository for UnreachableStore {
    async fn insert(&self, _log: &ScriptLog) -> FastgetsResult<()> {
        unreachable()
    }
    async fn finish(
        &self,
        _id: &str,
        _end_at: DateTime<Utc>,
        _traceback: Option<&Traceback>,
    ) -> FastgetsResult<ScriptFinish> {
        unreachable()
    }
    async fn get(&self, _id: &str) -> FastgetsResult<Option<ScriptLog>> {
        unreachable()
    }
}

#[async_trait]
impl ProcessRepository for UnreachableStore {
    async fn insert(&self, _process: &ProcessDescriptor) -> FastgetsResult<()> {
        unreachable()
    }
    async fn list(&self) -> FastgetsResult<Vec<ProcessDescriptor>> {
        unreachable()
    }
}

#[async_trait]
impl RawPageRepository for UnreachableStore {
    async fn put(&self, _instance_id: &str, _task_id: &str, _body: &[u8]) -> FastgetsResult<()> {
        unreachable()
    }
    async fn get(&self, _instance_id: &str, _task_id: &str) -> FastgetsResult<Option<Vec<u8>>> {
        unreachable()
    }
}

#[async_trait]
impl BitStore for UnreachableStore {
    async fn test_and_set_bits(
        &self,
        _key: &str,
        _offsets: &[u64],
        _ttl: Option<Duration>,
    ) -> FastgetsResult<bool> {
        unreachable()
    }
}

/// Task repository that works in memory until [`SeveredTaskStore::sever`] is
/// called, after which every call fails with a connectivity error.
#[derive(Debug, Default)]
pub struct SeveredTaskStore {
    inner: InMemoryStore,
    severed: AtomicBool,
}

impl SeveredTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sever(&self) {
        self.severed.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> FastgetsResult<()> {
        if self.severed.load(Ordering::SeqCst) {
            unreachable()
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TaskRepository for SeveredTaskStore {
    async fn insert(&self, task: &Task) -> FastgetsResult<()> {
        self.check()?;
        TaskRepository::insert(&self.inner, task).await
    }
    async fn claim_oldest(
        &self,
        instance_id: &str,
        started_at: DateTime<Utc>,
    ) -> FastgetsResult<Option<Task>> {
        self.check()?;
        self.inner.claim_oldest(instance_id, started_at).await
    }
    async fn finish(
        &self,
        task_id: &str,
        completion: &TaskCompletion,
        finished_at: DateTime<Utc>,
    ) -> FastgetsResult<Option<Task>> {
        self.check()?;
        TaskRepository::finish(&self.inner, task_id, completion, finished_at).await
    }
    async fn get(&self, task_id: &str) -> FastgetsResult<Option<Task>> {
        self.check()?;
        TaskRepository::get(&self.inner, task_id).await
    }
    async fn list_for_instance(&self, instance_id: &str) -> FastgetsResult<Vec<Task>> {
        self.check()?;
        self.inner.list_for_instance(instance_id).await
    }
}
