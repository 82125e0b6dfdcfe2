use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use fastgets_core::{Job, JobDefinition};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct AddJobParams {
    pub name: String,
    pub trigger: String,
    /// JSON 字符串
    pub payload: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteJobParams {
    pub id: String,
}

/// 新增或替换任务定义（按名称先删后建）
pub async fn add_job(
    State(state): State<AppState>,
    params: Result<Query<AddJobParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params?;
    if params.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name 不能为空".to_string()));
    }

    let payload = match params.payload.as_deref() {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("payload 不是合法的JSON: {e}")))?,
        _ => json!({}),
    };

    let definition = JobDefinition::new(params.name, params.trigger)
        .with_payload(payload)
        .enabled(params.enabled.unwrap_or(true));
    let job = state.services.registry.upsert_definition(definition).await?;
    info!("通过管理接口保存任务定义: {} ({})", job.name, job.id);

    Ok(Json(json!({})))
}

pub async fn delete_job(
    State(state): State<AppState>,
    params: Result<Query<DeleteJobParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params?;
    state.services.registry.delete_by_id(&params.id).await?;
    Ok(Json(json!({})))
}

pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<Job>>> {
    Ok(Json(state.services.registry.list().await?))
}
