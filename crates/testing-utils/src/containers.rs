//! Containerized Redis for integration tests. Requires a local Docker daemon.

use anyhow::Result;
use fastgets_core::config::{StorageBackend, StorageConfig};
use fastgets_infrastructure::StoreHandles;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

pub struct RedisTestContainer {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    pub storage: StorageConfig,
}

impl RedisTestContainer {
    pub async fn new() -> Result<Self> {
        let container = Redis::default().with_tag("7-alpine").start().await?;
        let port = container.get_host_port_ipv4(6379).await?;

        let storage = StorageConfig {
            backend: StorageBackend::Redis,
            redis_url: format!("redis://localhost:{port}"),
            key_prefix: "fastgets_test".to_string(),
            ..StorageConfig::default()
        };

        Ok(Self { container, storage })
    }

    pub async fn stores(&self) -> Result<StoreHandles> {
        Ok(StoreHandles::connect(&self.storage).await?)
    }
}
