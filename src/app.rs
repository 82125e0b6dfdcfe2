use anyhow::{Context, Result};
use fastgets_api::create_app;
use fastgets_coordinator::{default_dedup_key, fingerprint, Services};
use fastgets_core::{AppConfig, Task};
use fastgets_infrastructure::StoreHandles;
use fastgets_worker::{resolve_instance_id, ExecutorRegistry, TaskContext, WorkerRuntime};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行Worker
    Worker,
    /// 仅运行管理接口
    Api,
    /// Worker 与管理接口运行在同一进程
    All,
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    services: Services,
    metrics: Option<PrometheusHandle>,
}

impl Application {
    /// 按配置连接存储并组装组件
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序，存储后端: {:?}", config.storage.backend);

        let stores = StoreHandles::connect(&config.storage)
            .await
            .with_context(|| format!("连接存储失败: {}", mask_redis_url(&config.storage.redis_url)))?;
        let services = Services::new(&stores, &config);

        Ok(Self::with_services(config, services))
    }

    /// 使用已组装好的组件（测试和嵌入场景）
    pub fn with_services(config: AppConfig, services: Services) -> Self {
        Self {
            config,
            services,
            metrics: None,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 安装全局 Prometheus 记录器，每个进程只能调用一次
    pub fn install_metrics(&mut self) -> Result<()> {
        if !self.config.api.metrics_enabled {
            return Ok(());
        }
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("安装Prometheus指标记录器失败")?;
        self.metrics = Some(handle);
        info!("指标记录器已安装");
        Ok(())
    }

    /// 运行应用程序直到收到关闭信号
    pub async fn run(&self, mode: AppMode, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", mode);

        match mode {
            AppMode::Worker => self.run_worker(shutdown_rx).await,
            AppMode::Api => self.run_api(shutdown_rx).await,
            AppMode::All => self.run_all_components(shutdown_rx).await,
        }
    }

    /// 运行Worker主循环，存储不可达时返回错误
    pub async fn run_worker(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let instance_id = resolve_instance_id(&self.config.worker);
        info!("启动Worker: {}", instance_id);

        let mut runtime = WorkerRuntime::new(
            instance_id,
            &self.services,
            ExecutorRegistry::with_defaults(),
            &self.config.worker,
        );
        runtime.run(shutdown_rx).await.context("Worker异常退出")?;

        info!("Worker已停止");
        Ok(())
    }

    /// 运行管理接口
    pub async fn run_api(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let bind_address = &self.config.api.bind_address;
        let listener = TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {bind_address}"))?;

        let app = create_app(self.services.clone(), self.metrics.clone());
        fastgets_api::serve(listener, app, shutdown_rx)
            .await
            .context("管理接口运行失败")?;

        info!("管理接口已停止");
        Ok(())
    }

    /// 任一组件退出时通知另一组件停止，Worker的致命错误会结束整个进程
    async fn run_all_components(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let (worker_tx, worker_rx) = broadcast::channel(1);
        let (api_tx, api_rx) = broadcast::channel(1);

        let worker = async {
            let result = self.run_worker(worker_rx).await;
            let _ = api_tx.send(());
            result
        };
        let api = async {
            let result = self.run_api(api_rx).await;
            let _ = worker_tx.send(());
            result
        };
        let components = async { tokio::join!(worker, api) };
        tokio::pin!(components);

        let (worker, api) = tokio::select! {
            results = &mut components => results,
            _ = shutdown_rx.recv() => {
                let _ = worker_tx.send(());
                let _ = api_tx.send(());
                components.await
            }
        };

        if let Err(e) = &worker {
            error!("Worker运行失败: {:#}", e);
        }
        if let Err(e) = &api {
            error!("管理接口运行失败: {:#}", e);
        }
        info!("所有组件已停止");
        worker.and(api)
    }

    /// 在任务池之外执行一次执行器，执行过程记录为脚本日志
    pub async fn run_script(&self, name: &str, payload: serde_json::Value) -> Result<serde_json::Value> {
        let executors = ExecutorRegistry::with_defaults();
        let key = default_dedup_key(name, &payload)?;
        let task = Task::new(name, payload, fingerprint(&key), None);
        let executor = executors
            .resolve(&task)
            .with_context(|| format!("没有可用的执行器: {name}"))?;

        let instance_id = resolve_instance_id(&self.config.worker);
        let ctx = TaskContext::new(task, instance_id, self.services.raw_pages.clone());

        self.services
            .sink
            .track_script(name, async { executor.execute(&ctx).await })
            .await
    }
}

/// 日志中隐藏连接地址里的密码
fn mask_redis_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{}://{}:***@{}", &url[..scheme_end], user, &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
