use std::sync::Arc;

use tracing::info;

use fastgets_core::models::ProcessDescriptor;
use fastgets_core::traits::ProcessRepository;
use fastgets_core::FastgetsResult;

/// Worker 进程登记，仅保存元数据
#[derive(Clone)]
pub struct ProcessRegistry {
    processes: Arc<dyn ProcessRepository>,
}

impl ProcessRegistry {
    pub fn new(processes: Arc<dyn ProcessRepository>) -> Self {
        Self { processes }
    }

    pub async fn register(
        &self,
        name: &str,
        process_type: &str,
    ) -> FastgetsResult<ProcessDescriptor> {
        let process = ProcessDescriptor::new(name, process_type);
        self.processes.insert(&process).await?;
        info!("登记进程: {} (类型: {}, ID: {})", name, process_type, process.id);
        Ok(process)
    }

    pub async fn list(&self) -> FastgetsResult<Vec<ProcessDescriptor>> {
        self.processes.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastgets_infrastructure::InMemoryStore;

    #[tokio::test]
    async fn registered_processes_are_listed() {
        let registry = ProcessRegistry::new(Arc::new(InMemoryStore::new()));
        registry.register("crawler-a", "spider").await.unwrap();
        registry.register("crawler-b", "spider").await.unwrap();

        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["crawler-a", "crawler-b"]);
    }
}
