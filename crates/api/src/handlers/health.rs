use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "fastgets",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus 文本格式的指标
pub async fn render_metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("指标未启用".to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
