//! 统一错误处理
//!
//! # 错误码规范
//!
//! | 错误码 | 说明 |
//! |--------|------|
//! | E0000 | 成功 |
//! | E0002 | 验证失败 |
//! | E0003 | 资源不存在 |
//! | E0004 | 打印机忙 |
//! | E9001 | 内部错误 |
//! | E9002 | 存储错误 |
//! | E9201 | 打印机不可用 |
//! | E9202 | 打印失败 |
//! | E9203 | 打印机未配置 |

use crate::printing::{ConnectionError, PrintStorageError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// API 统一响应结构
///
/// ```json
/// {
///   "code": "E0000",
///   "message": "Success",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    /// 404
    NotFound(String),

    #[error("Validation failed: {0}")]
    /// 400
    Validation(String),

    #[error("Printer busy: {0}")]
    /// 409
    PrinterBusy(String),

    #[error("Printer not configured: {0}")]
    /// 400
    PrinterNotConfigured(String),

    #[error("Printer not available: {0}")]
    /// 503
    PrinterUnavailable(String),

    #[error("Print failed: {0}")]
    /// 502
    PrintFailed(String),

    #[error("Storage error: {0}")]
    /// 500
    Storage(String),

    #[error("Internal server error: {0}")]
    /// 500
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg.as_str()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg.as_str()),
            AppError::PrinterBusy(msg) => (StatusCode::CONFLICT, "E0004", msg.as_str()),
            AppError::PrinterNotConfigured(msg) => {
                (StatusCode::BAD_REQUEST, "E9203", msg.as_str())
            }
            AppError::PrinterUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "E9201", msg.as_str())
            }
            AppError::PrintFailed(msg) => (StatusCode::BAD_GATEWAY, "E9202", msg.as_str()),
            AppError::Storage(msg) => {
                error!(target: "storage", error = %msg, "Storage error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "E9002", "Storage error")
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9001",
                    "Internal server error",
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message: message.to_string(),
            data: None,
        });

        (status, body).into_response()
    }
}

impl From<PrintStorageError> for AppError {
    fn from(e: PrintStorageError) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<ConnectionError> for AppError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::Configuration(_) => AppError::PrinterNotConfigured(e.to_string()),
            ConnectionError::Timeout(_) | ConnectionError::Refused(_) => {
                AppError::PrinterUnavailable(e.to_string())
            }
            ConnectionError::Transmission(_) => AppError::PrintFailed(e.to_string()),
            ConnectionError::AlreadyInProgress(_) => AppError::PrinterBusy(e.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: "Success".to_string(),
        data: Some(data),
    })
}

/// Create a successful response with custom message
pub fn ok_with_message<T: Serialize>(data: T, message: impl Into<String>) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: message.into(),
        data: Some(data),
    })
}
