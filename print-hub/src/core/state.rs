use std::sync::Arc;

use crab_printer::{Connector, DeviceConnector};
use tracing::{info, warn};

use crate::core::{Config, Result};
use crate::printing::{HttpCaptureGateway, PrintQueue, PrintStorage, PrinterConnectionManager};
use crate::utils::time::now_millis;

/// Printed-label keys older than this are forgotten at startup
const PRINTED_LABEL_RETENTION_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// 服务状态
///
/// 所有字段都是廉价克隆的共享句柄，直接作为 axum State 使用。
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub storage: PrintStorage,
    pub connections: Arc<PrinterConnectionManager>,
    pub queue: Arc<PrintQueue>,
}

impl ServerState {
    /// Wire the pipeline around an existing store and transport factory
    pub fn new(config: Config, storage: PrintStorage, connector: Arc<dyn Connector>) -> Self {
        let connections = Arc::new(
            PrinterConnectionManager::new(connector).with_timeout(config.connect_timeout()),
        );
        let queue = Arc::new(PrintQueue::new(
            config.queue_config(),
            connections.clone(),
            storage.clone(),
        ));
        Self {
            config,
            storage,
            connections,
            queue,
        }
    }

    /// 初始化: 工作目录、数据库、渲染器
    pub fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let db_path = config.database_path();
        let storage = PrintStorage::open(&db_path)?;
        info!(path = %db_path.display(), "Print storage opened");

        let forgotten = storage.cleanup_printed_labels(now_millis() - PRINTED_LABEL_RETENTION_MS)?;
        if forgotten > 0 {
            info!(count = forgotten, "Expired printed-label records removed");
        }
        let pending_failed = storage.failed_count()?;
        if pending_failed > 0 {
            warn!(count = pending_failed, "Failed print tasks awaiting retry or clear");
        }

        let state = Self::new(config.clone(), storage, Arc::new(DeviceConnector));

        match &config.capture_url {
            Some(url) => {
                let gateway = HttpCaptureGateway::new(url.clone(), config.capture_timeout())?;
                state.queue.set_renderer(Arc::new(gateway));
                info!(url = %url, "Capture gateway registered");
            }
            None => {
                warn!("CAPTURE_URL not set, print jobs will fail until a renderer is registered");
            }
        }

        Ok(state)
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
