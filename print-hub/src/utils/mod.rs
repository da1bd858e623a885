//! 工具模块
//!
//! - [`AppError`] / [`AppResponse`] - HTTP 错误与响应结构
//! - 日志、时间工具

pub mod error;
pub mod logger;
pub mod time;

pub use error::{AppError, AppResponse, AppResult, ok, ok_with_message};
