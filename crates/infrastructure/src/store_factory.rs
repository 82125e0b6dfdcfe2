use std::sync::Arc;

use fastgets_core::config::{StorageBackend, StorageConfig};
use fastgets_core::traits::{
    BitStore, ErrorRepository, JobRepository, ProcessRepository, RawPageRepository,
    ScriptLogRepository, TaskRepository,
};
use fastgets_core::FastgetsResult;
use tracing::info;

use crate::{InMemoryStore, RedisStore};

/// 按配置创建的全部存储句柄，各组件只依赖自己需要的那部分
#[derive(Clone)]
pub struct StoreHandles {
    pub jobs: Arc<dyn JobRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub errors: Arc<dyn ErrorRepository>,
    pub script_logs: Arc<dyn ScriptLogRepository>,
    pub processes: Arc<dyn ProcessRepository>,
    pub raw_pages: Arc<dyn RawPageRepository>,
    pub bits: Arc<dyn BitStore>,
}

impl StoreHandles {
    /// 所有句柄共享同一个底层存储
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: JobRepository
            + TaskRepository
            + ErrorRepository
            + ScriptLogRepository
            + ProcessRepository
            + RawPageRepository
            + BitStore
            + 'static,
    {
        Self {
            jobs: store.clone(),
            tasks: store.clone(),
            errors: store.clone(),
            script_logs: store.clone(),
            processes: store.clone(),
            raw_pages: store.clone(),
            bits: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_shared(Arc::new(InMemoryStore::new()))
    }

    pub async fn connect(config: &StorageConfig) -> FastgetsResult<Self> {
        match config.backend {
            StorageBackend::Redis => {
                let store = RedisStore::connect(config).await?;
                Ok(Self::from_shared(Arc::new(store)))
            }
            StorageBackend::Memory => {
                info!("使用内存存储，数据不会在进程之间共享");
                Ok(Self::in_memory())
            }
        }
    }
}
