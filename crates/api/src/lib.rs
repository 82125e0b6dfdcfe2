//! # fastgets 管理接口
//!
//! 基于 axum 的HTTP管理面，直接调用协调层组件：
//!
//! - `POST /job/add?name=&trigger=&payload=&enabled=` 新增或替换任务定义
//! - `POST /job/delete?id=` 删除任务定义
//! - `GET /job/list` 列出任务定义
//! - `POST /process/add?name=&type=` 登记进程描述
//! - `GET /process/list` 列出进程描述
//! - `GET /fatal_error/list` 最新的100条错误记录
//! - `GET /fatal_error/flushall` 清空错误记录
//! - `GET /task/page_raw?task_id=&instance_id=` 原始页面
//! - `GET /task/list?instance_id=` 实例相关的任务
//! - `GET /health`, `GET /metrics`
//!
//! 错误统一返回 `{"error": <代码>, "message": <描述>}`。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::Router;
use fastgets_coordinator::Services;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tracing::info;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

pub use error::{ApiError, ApiResult};

/// 创建完整的管理接口应用
pub fn create_app(services: Services, metrics: Option<PrometheusHandle>) -> Router {
    let state = AppState { services, metrics };

    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}

/// 在已绑定的监听器上提供服务，收到停止信号后优雅退出
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("管理接口监听于 {}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            info!("管理接口收到停止信号");
        })
        .await
}
