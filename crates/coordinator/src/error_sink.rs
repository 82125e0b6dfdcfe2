use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{error, info, warn};

use fastgets_core::models::{ErrorRecord, ScriptLog, Traceback};
use fastgets_core::traits::{ErrorRepository, ScriptFinish, ScriptLogRepository};
use fastgets_core::{FastgetsError, FastgetsResult};

/// 管理接口默认返回的失败记录条数
pub const DEFAULT_ERROR_LIST_LIMIT: usize = 100;

/// 失败记录与脚本运行记录
#[derive(Clone)]
pub struct ErrorSink {
    errors: Arc<dyn ErrorRepository>,
    script_logs: Arc<dyn ScriptLogRepository>,
    host: String,
}

impl ErrorSink {
    pub fn new(
        errors: Arc<dyn ErrorRepository>,
        script_logs: Arc<dyn ScriptLogRepository>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            errors,
            script_logs,
            host: host.into(),
        }
    }

    /// 使用本机主机名作为失败记录来源
    pub fn with_local_host(
        errors: Arc<dyn ErrorRepository>,
        script_logs: Arc<dyn ScriptLogRepository>,
    ) -> Self {
        Self::new(errors, script_logs, local_hostname())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn record_error(
        &self,
        traceback: Traceback,
        source_host: &str,
    ) -> FastgetsResult<ErrorRecord> {
        let record = ErrorRecord::new(traceback, source_host);
        self.errors.append(&record).await?;
        counter!("fastgets_errors_recorded_total").increment(1);
        warn!(
            "记录任务失败 {} (来源: {}): {}",
            record.id, record.source_host, record.traceback
        );
        Ok(record)
    }

    pub async fn report(&self, traceback: Traceback) -> FastgetsResult<ErrorRecord> {
        self.record_error(traceback, &self.host).await
    }

    pub async fn list_errors(&self, limit: usize) -> FastgetsResult<Vec<ErrorRecord>> {
        self.errors.list_recent(limit).await
    }

    /// 清空全部失败记录，不可恢复
    pub async fn flush_all(&self) -> FastgetsResult<u64> {
        let removed = self.errors.clear().await?;
        info!("已清空 {} 条失败记录", removed);
        Ok(removed)
    }

    pub async fn script_started(&self, name: &str) -> FastgetsResult<ScriptLog> {
        let log = ScriptLog::start(name);
        self.script_logs.insert(&log).await?;
        info!("脚本开始: {} ({})", log.name, log.id);
        Ok(log)
    }

    /// 结束时间只写入一次，重复调用返回 `AlreadyFinished` 且不修改记录
    pub async fn script_finished(
        &self,
        id: &str,
        traceback: Option<Traceback>,
    ) -> FastgetsResult<ScriptLog> {
        match self
            .script_logs
            .finish(id, Utc::now(), traceback.as_ref())
            .await?
        {
            ScriptFinish::Finished(log) => {
                info!(
                    "脚本结束: {} ({}){}",
                    log.name,
                    log.id,
                    if log.traceback.is_some() { " - 失败" } else { "" }
                );
                Ok(log)
            }
            ScriptFinish::AlreadyFinished(_) => Err(FastgetsError::AlreadyFinished {
                id: id.to_string(),
            }),
            ScriptFinish::NotFound => Err(FastgetsError::ScriptLogNotFound {
                id: id.to_string(),
            }),
        }
    }

    /// 以脚本记录包裹一次运行：开始前写入开始记录，结束后写入结束时间，失败时附带错误链
    pub async fn track_script<F, T>(&self, name: &str, future: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let log = self.script_started(name).await?;
        let outcome = future.await;

        let traceback = outcome.as_ref().err().map(Traceback::from_error);
        if let Err(e) = self.script_finished(&log.id, traceback).await {
            error!("写入脚本结束记录失败 {}: {}", log.id, e);
            if outcome.is_ok() {
                return Err(e.into());
            }
        }

        outcome
    }
}

pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
