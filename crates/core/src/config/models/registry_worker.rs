use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 回看窗口上限：一年
pub const MAX_MISFIRE_GRACE_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 计算到期任务时向前回看的窗口（秒），更早错过的触发点不再补发
    pub misfire_grace_seconds: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            misfire_grace_seconds: 60,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.misfire_grace_seconds <= 0 {
            return Err(anyhow::anyhow!("回看窗口必须大于0"));
        }
        if self.misfire_grace_seconds > MAX_MISFIRE_GRACE_SECONDS {
            return Err(anyhow::anyhow!(
                "回看窗口({}秒)不能超过{}秒",
                self.misfire_grace_seconds,
                MAX_MISFIRE_GRACE_SECONDS
            ));
        }
        Ok(())
    }

    /// 未经校验的配置也会被截断到合法范围
    pub fn misfire_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.misfire_grace_seconds.clamp(1, MAX_MISFIRE_GRACE_SECONDS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 为空时使用 `主机名-进程号`
    pub instance_id: Option<String>,
    pub poll_interval_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            instance_id: None,
            poll_interval_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(id) = &self.instance_id {
            if id.trim().is_empty() {
                return Err(anyhow::anyhow!("Worker实例ID不能为空白"));
            }
        }

        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("轮询间隔必须大于0"));
        }

        if self.max_backoff_ms < self.poll_interval_ms {
            return Err(anyhow::anyhow!(
                "最大退避时间({}ms)不能小于轮询间隔({}ms)",
                self.max_backoff_ms,
                self.poll_interval_ms
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
