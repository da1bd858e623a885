use crate::printing::QueueConfig;
use std::path::PathBuf;
use std::time::Duration;

/// 服务配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/crab/print-hub | 工作目录 |
/// | HTTP_PORT | 3100 | HTTP 服务端口 |
/// | CAPTURE_URL | (无) | 截图服务地址，未设置时不注册渲染器 |
/// | CAPTURE_TIMEOUT_MS | 10000 | 截图请求超时(毫秒) |
/// | MAX_RETRIES | 3 | 每个任务最大尝试次数 |
/// | RETRY_DELAY_MS | 2000 | 重试间隔(毫秒) |
/// | CONNECT_TIMEOUT_MS | 15000 | 打印机连接超时(毫秒) |
/// | CAPTURE_SETTLE_MS | 0 | 截图后等待(毫秒) |
/// | HISTORY_LIMIT | 100 | 打印历史条数上限 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (无) | 日志目录，存在时写入滚动日志 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/print-hub CAPTURE_URL=http://127.0.0.1:5173/capture cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存放 redb 数据库
    pub work_dir: String,
    pub http_port: u16,
    pub capture_url: Option<String>,
    pub capture_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub capture_settle_ms: u64,
    pub history_limit: usize,
    pub log_level: String,
    pub log_dir: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置或无法解析时使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR")
                .unwrap_or_else(|_| "/var/lib/crab/print-hub".into()),
            http_port: env_or("HTTP_PORT", 3100),
            capture_url: std::env::var("CAPTURE_URL").ok().filter(|u| !u.is_empty()),
            capture_timeout_ms: env_or("CAPTURE_TIMEOUT_MS", 10_000),
            max_retries: env_or("MAX_RETRIES", 3u32).max(1),
            retry_delay_ms: env_or("RETRY_DELAY_MS", 2000),
            connect_timeout_ms: env_or("CONNECT_TIMEOUT_MS", 15_000),
            capture_settle_ms: env_or("CAPTURE_SETTLE_MS", 0),
            history_limit: env_or("HISTORY_LIMIT", 100),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
        }
    }

    /// 使用自定义工作目录和端口
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// redb 数据库文件路径
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("print-hub.redb")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            capture_settle: Duration::from_millis(self.capture_settle_ms),
            history_limit: self.history_limit,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
