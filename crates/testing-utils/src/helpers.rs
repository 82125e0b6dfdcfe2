//! Test helper utilities and common testing patterns.

use std::time::Duration;

use chrono::Utc;
use fastgets_core::AppConfig;
use fastgets_core::config::StorageBackend;
use tokio::time::sleep;

pub struct TestEnv;

impl TestEnv {
    /// Poll `condition` every 20ms until it holds or `timeout` elapses
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }

        false
    }

    pub fn unique_name(prefix: &str) -> String {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        format!("{prefix}_{timestamp}")
    }

    /// In-memory backend with a fast polling loop
    pub fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.worker.instance_id = Some("test-worker".to_string());
        config.worker.poll_interval_ms = 10;
        config.worker.max_backoff_ms = 40;
        config.dedup.capacity = 10_000;
        config
    }
}
