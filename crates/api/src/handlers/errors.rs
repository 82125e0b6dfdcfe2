use axum::{extract::State, Json};
use fastgets_coordinator::DEFAULT_ERROR_LIST_LIMIT;
use fastgets_core::ErrorRecord;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiResult;
use crate::routes::AppState;

/// 最新的错误记录，最新的在前
pub async fn list_errors(State(state): State<AppState>) -> ApiResult<Json<Vec<ErrorRecord>>> {
    Ok(Json(
        state.services.sink.list_errors(DEFAULT_ERROR_LIST_LIMIT).await?,
    ))
}

pub async fn flush_errors(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let removed = state.services.sink.flush_all().await?;
    info!("清空错误日志，共 {} 条", removed);
    Ok(Json(json!({})))
}
