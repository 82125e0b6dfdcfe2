use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fastgets_core::FastgetsError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    Fastgets(FastgetsError),
    BadRequest(String),
    NotFound(String),
}

impl From<FastgetsError> for ApiError {
    fn from(e: FastgetsError) -> Self {
        ApiError::Fastgets(e)
    }
}

/// 查询参数缺失或格式错误时同样返回JSON错误体
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Fastgets(e) => write!(f, "{e}"),
            ApiError::BadRequest(msg) => write!(f, "请求参数错误: {msg}"),
            ApiError::NotFound(msg) => write!(f, "资源不存在: {msg}"),
        }
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Fastgets(e) => match e {
                FastgetsError::InvalidTrigger { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_TRIGGER")
                }
                FastgetsError::JobNotFound { .. } => (StatusCode::NOT_FOUND, "JOB_NOT_FOUND"),
                FastgetsError::TaskNotFound { .. } => (StatusCode::NOT_FOUND, "TASK_NOT_FOUND"),
                FastgetsError::ScriptLogNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "SCRIPT_LOG_NOT_FOUND")
                }
                FastgetsError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION")
                }
                FastgetsError::AlreadyFinished { .. } => (StatusCode::CONFLICT, "ALREADY_FINISHED"),
                FastgetsError::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "error": code,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
