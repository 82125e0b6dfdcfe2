use std::collections::HashMap;
use std::sync::Arc;

use fastgets_core::models::Task;
use tracing::info;

use crate::executor::Executor;
use crate::executors::{HttpExecutor, ShellExecutor};

/// 执行器查找表
///
/// 先按任务名查找，找不到时再按 payload 的 `"type"` 字段查找。
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置的 `shell` 与 `http` 执行器
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("shell", Arc::new(ShellExecutor::new()));
        registry.register("http", Arc::new(HttpExecutor::new()));
        registry
    }

    pub fn register(&mut self, key: impl Into<String>, executor: Arc<dyn Executor>) {
        let key = key.into();
        info!("注册执行器 '{}' ({})", key, executor.name());
        self.executors.insert(key, executor);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Executor>> {
        self.executors.get(key).cloned()
    }

    pub fn resolve(&self, task: &Task) -> Option<Arc<dyn Executor>> {
        self.get(&task.job_name).or_else(|| {
            task.payload
                .get("type")
                .and_then(|t| t.as_str())
                .and_then(|t| self.get(t))
        })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.keys().cloned().collect();
        names.sort();
        names
    }
}
