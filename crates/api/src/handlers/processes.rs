use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use fastgets_core::ProcessDescriptor;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct AddProcessParams {
    pub name: String,
    #[serde(rename = "type")]
    pub process_type: String,
}

pub async fn add_process(
    State(state): State<AppState>,
    params: Result<Query<AddProcessParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params?;
    if params.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name 不能为空".to_string()));
    }
    state
        .services
        .processes
        .register(&params.name, &params.process_type)
        .await?;
    Ok(Json(json!({})))
}

pub async fn list_processes(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ProcessDescriptor>>> {
    Ok(Json(state.services.processes.list().await?))
}
