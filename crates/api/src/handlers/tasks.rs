use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use fastgets_core::Task;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct PageRawParams {
    pub task_id: String,
    pub instance_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    pub instance_id: String,
}

/// 原样返回任务抓取到的页面
pub async fn page_raw(
    State(state): State<AppState>,
    params: Result<Query<PageRawParams>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(params) = params?;
    let body = state
        .services
        .raw_pages
        .get(&params.instance_id, &params.task_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "原始页面 {}/{}",
                params.instance_id, params.task_id
            ))
        })?;

    Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body))
}

/// 某个实例产生或认领过的任务
pub async fn list_tasks(
    State(state): State<AppState>,
    params: Result<Query<ListTasksParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Task>>> {
    let Query(params) = params?;
    Ok(Json(
        state
            .services
            .pool
            .tasks_for_instance(&params.instance_id)
            .await?,
    ))
}
