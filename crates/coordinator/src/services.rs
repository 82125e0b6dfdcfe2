use std::sync::Arc;

use fastgets_core::traits::RawPageRepository;
use fastgets_core::AppConfig;
use fastgets_infrastructure::StoreHandles;

use crate::{DedupFilter, ErrorSink, JobRegistry, ProcessRegistry, TaskPool};

/// 由同一组存储句柄组装出的全部组件，Worker 与管理接口共用
#[derive(Clone)]
pub struct Services {
    pub registry: JobRegistry,
    pub pool: TaskPool,
    pub sink: ErrorSink,
    pub processes: ProcessRegistry,
    pub raw_pages: Arc<dyn RawPageRepository>,
}

impl Services {
    pub fn new(stores: &StoreHandles, config: &AppConfig) -> Self {
        let sink = ErrorSink::with_local_host(stores.errors.clone(), stores.script_logs.clone());
        let dedup = DedupFilter::new(stores.bits.clone(), &config.dedup);

        Self {
            registry: JobRegistry::new(stores.jobs.clone(), &config.registry),
            pool: TaskPool::new(stores.tasks.clone(), dedup, sink.clone()),
            sink,
            processes: ProcessRegistry::new(stores.processes.clone()),
            raw_pages: stores.raw_pages.clone(),
        }
    }

    /// 进程内存储上的一套组件，用于测试和单进程调试
    pub fn in_memory(config: &AppConfig) -> Self {
        Self::new(&StoreHandles::in_memory(), config)
    }
}
