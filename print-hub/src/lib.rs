//! Crab Print Hub - 餐厅 POS 打印编排服务
//!
//! # 架构概述
//!
//! - **模型** (`models`): 订单、打印任务、打印机配置
//! - **打印管线** (`printing`): 订单拆分、双队列引擎、连接管理、失败任务存储
//! - **HTTP API** (`api`): 入队、失败任务管理、打印机配置与测试、SSE 事件
//!
//! # 模块结构
//!
//! ```text
//! print-hub/src/
//! ├── core/          # 配置、状态、错误、服务器
//! ├── models/        # 数据模型
//! ├── printing/      # 打印管线
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 日志、错误响应、时间
//! ```

pub mod api;
pub mod core;
pub mod models;
pub mod printing;
pub mod utils;

pub use core::{Config, Server, ServerState};
pub use printing::{PrintQueue, PrinterConnectionManager, QueueConfig, QueueEvent, Renderer};
pub use utils::{AppError, AppResult};
pub use utils::logger::{init_logger, init_logger_with_file};

/// Print startup banner
pub fn print_banner() {
    println!(
        r#"
   ______           __
  / ____/________ _/ /_
 / /   / ___/ __ `/ __ \
/ /___/ /  / /_/ / /_/ /
\____/_/   \__,_/_.___/
    ____       _       __     __  __      __
   / __ \_____(_)___  / /_   / / / /_  __/ /_
  / /_/ / ___/ / __ \/ __/  / /_/ / / / / __ \
 / ____/ /  / / / / / /_   / __  / /_/ / /_/ /
/_/   /_/  /_/_/ /_/\__/  /_/ /_/\__,_/_.___/
    "#
    );
}

/// Load `.env` and initialise logging
pub fn setup_environment() {
    dotenv::dotenv().ok();
    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
}
