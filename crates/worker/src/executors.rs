use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::process::Command;
use tracing::info;

use crate::executor::{Executor, TaskContext};

/// Shell任务参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellTaskParams {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

/// Shell任务执行器，退出码非0时任务失败
#[derive(Debug, Default, Clone)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    fn name(&self) -> &str {
        "shell"
    }

    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<serde_json::Value> {
        let start_time = Instant::now();
        let params: ShellTaskParams =
            serde_json::from_value(ctx.payload().clone()).context("解析Shell任务参数失败")?;

        info!(
            "执行Shell任务: task_id={}, command={}, args={:?}",
            ctx.task.id, params.command, params.args
        );

        let mut cmd = Command::new(&params.command);
        cmd.args(&params.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &params.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &params.env_vars {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .await
            .with_context(|| format!("启动Shell命令失败: {}", params.command))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        let exit_code = output.status.code();
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Shell任务执行完成: task_id={}, success={}, exit_code={:?}, duration={}ms",
            ctx.task.id,
            output.status.success(),
            exit_code,
            execution_time_ms
        );

        if !output.status.success() {
            let failure = format!("命令执行失败，退出码: {exit_code:?}");
            // stderr 作为根因排在错误链末尾
            return Err(if stderr.is_empty() {
                anyhow!(failure)
            } else {
                anyhow!(stderr).context(failure)
            });
        }

        Ok(json!({
            "exit_code": exit_code,
            "stdout": stdout,
            "stderr": stderr,
            "execution_time_ms": execution_time_ms,
        }))
    }
}

/// HTTP任务参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTaskParams {
    pub url: String,
    pub method: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// 抓取页面并保存原始内容，非2xx状态码时任务失败
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            default_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<serde_json::Value> {
        let start_time = Instant::now();
        let params: HttpTaskParams =
            serde_json::from_value(ctx.payload().clone()).context("解析HTTP任务参数失败")?;

        let method = params.method.as_deref().unwrap_or("GET").to_uppercase();
        info!(
            "执行HTTP任务: task_id={}, method={}, url={}",
            ctx.task.id, method, params.url
        );

        let mut request = match method.as_str() {
            "GET" => self.client.get(&params.url),
            "POST" => self.client.post(&params.url),
            "PUT" => self.client.put(&params.url),
            "DELETE" => self.client.delete(&params.url),
            "PATCH" => self.client.patch(&params.url),
            "HEAD" => self.client.head(&params.url),
            other => return Err(anyhow!("不支持的HTTP方法: {other}")),
        };
        request = request.timeout(
            params
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(self.default_timeout),
        );
        for (key, value) in &params.headers {
            request = request.header(key, value);
        }
        if let Some(body) = params.body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("请求失败: {}", params.url))?;
        let status = response.status();
        let body = response.bytes().await.context("读取响应体失败")?;

        ctx.save_raw_page(&body)
            .await
            .context("保存原始页面失败")?;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "HTTP任务执行完成: task_id={}, status={}, bytes={}, duration={}ms",
            ctx.task.id,
            status.as_u16(),
            body.len(),
            execution_time_ms
        );

        if !status.is_success() {
            return Err(anyhow!("HTTP请求返回错误状态码 {}: {}", status.as_u16(), params.url));
        }

        Ok(json!({
            "url": params.url,
            "status_code": status.as_u16(),
            "bytes": body.len(),
            "execution_time_ms": execution_time_ms,
        }))
    }
}
