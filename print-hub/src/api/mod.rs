//! API 路由模块
//!
//! - [`print`] - 打印队列、失败任务、历史、事件流
//! - [`printers`] - 打印机配置、状态和测试

pub mod print;
pub mod printers;

use axum::Router;

use crate::core::ServerState;

/// All HTTP routes
pub fn router() -> Router<ServerState> {
    Router::new()
        .merge(print::router())
        .merge(printers::router())
}
