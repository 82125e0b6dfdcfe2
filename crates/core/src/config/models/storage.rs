use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 存储后端类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Redis,
    /// 进程内存储，仅用于单进程调试和测试
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub redis_url: String,
    pub key_prefix: String,
    pub connection_timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "fastgets".to_string(),
            connection_timeout_seconds: 5,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend == StorageBackend::Redis {
            if self.redis_url.is_empty() {
                return Err(anyhow::anyhow!("Redis连接地址不能为空"));
            }
            if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://")
            {
                return Err(anyhow::anyhow!("Redis连接地址格式无效: {}", self.redis_url));
            }
        }

        if self.key_prefix.is_empty() {
            return Err(anyhow::anyhow!("存储键前缀不能为空"));
        }

        if self.connection_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("连接超时时间必须大于0"));
        }

        Ok(())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }
}

/// 去重过滤器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// 位数组所在的键（会拼接存储键前缀）
    pub key: String,
    /// 预期容纳的元素数量
    pub capacity: u64,
    /// 可接受的误判率
    pub error_rate: f64,
    /// 过期时间（秒），0 表示永久保留
    pub ttl_seconds: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            key: "dedup".to_string(),
            capacity: 1_000_000,
            error_rate: 0.001,
            ttl_seconds: 0,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.key.is_empty() {
            return Err(anyhow::anyhow!("去重键不能为空"));
        }

        if self.capacity == 0 {
            return Err(anyhow::anyhow!("去重容量必须大于0"));
        }

        if !(self.error_rate > 0.0 && self.error_rate < 1.0) {
            return Err(anyhow::anyhow!(
                "去重误判率必须在(0, 1)之间: {}",
                self.error_rate
            ));
        }

        Ok(())
    }

    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_seconds > 0).then(|| Duration::from_secs(self.ttl_seconds))
    }
}
