use axum::{
    routing::{get, post},
    Router,
};
use fastgets_coordinator::Services;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::{
    errors::{flush_errors, list_errors},
    health::{health_check, render_metrics},
    jobs::{add_job, delete_job, list_jobs},
    processes::{add_process, list_processes},
    tasks::{list_tasks, page_raw},
};

/// 管理接口共享状态
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// 未启用指标时为 None，`/metrics` 返回 404
    pub metrics: Option<PrometheusHandle>,
}

/// 创建管理接口路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        // 任务定义
        .route("/job/add", post(add_job))
        .route("/job/delete", post(delete_job))
        .route("/job/list", get(list_jobs))
        // 进程描述
        .route("/process/add", post(add_process))
        .route("/process/list", get(list_processes))
        // 错误日志
        .route("/fatal_error/list", get(list_errors))
        .route("/fatal_error/flushall", get(flush_errors))
        // 任务
        .route("/task/page_raw", get(page_raw))
        .route("/task/list", get(list_tasks))
        .with_state(state)
}
