//! Printer Connection Manager
//!
//! Opens one session per operation and always closes it afterwards. Each
//! role has a single admission slot: a second request while one is in
//! flight is rejected, never queued, so two command streams can't
//! interleave on one printer.

use super::error::{ConnectionError, ConnectionResult};
use crate::models::{ConnectionStatus, PrinterConfig, PrinterRole};
use crab_printer::{Connector, PrintResult, PrinterSession, TsplBuilder, test_page};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

struct RoleSlot {
    busy: Mutex<()>,
    status: watch::Sender<ConnectionStatus>,
}

impl RoleSlot {
    fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Unknown);
        Self {
            busy: Mutex::new(()),
            status,
        }
    }
}

/// 打印机连接管理器
pub struct PrinterConnectionManager {
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    slots: [RoleSlot; 2],
}

impl PrinterConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            slots: [RoleSlot::new(), RoleSlot::new()],
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn slot(&self, role: PrinterRole) -> &RoleSlot {
        &self.slots[role.index()]
    }

    /// Current advisory status of a role
    pub fn status(&self, role: PrinterRole) -> ConnectionStatus {
        *self.slot(role).status.borrow()
    }

    /// Open a session for `config`
    ///
    /// Validation happens before any I/O; opening is bounded by the connect
    /// timeout.
    pub async fn connect(
        &self,
        config: &PrinterConfig,
        role: PrinterRole,
    ) -> ConnectionResult<Box<dyn PrinterSession>> {
        let endpoint = config
            .endpoint()
            .map_err(|msg| ConnectionError::Configuration(format!("{} printer: {}", role, msg)))?;

        debug!(role = %role, endpoint = %endpoint, "opening printer session");
        match tokio::time::timeout(self.connect_timeout, self.connector.open(&endpoint)).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => Err(ConnectionError::from_open(e)),
            Err(_) => Err(ConnectionError::Timeout(self.connect_timeout)),
        }
    }

    /// Connect, probe, close. Consumes no paper.
    pub async fn test_connection(
        &self,
        config: &PrinterConfig,
        role: PrinterRole,
    ) -> ConnectionResult<()> {
        self.with_session(config, role, |session| {
            Box::pin(async move { session.probe().await })
        })
        .await
    }

    /// Connect and print a minimal physical test pattern
    ///
    /// Bill printers get a short text ticket, label printers run their
    /// built-in self test. Only call this from an explicit user action.
    pub async fn test_connection_with_print(
        &self,
        config: &PrinterConfig,
        role: PrinterRole,
    ) -> ConnectionResult<()> {
        let payload = match role {
            PrinterRole::Bill => test_page(config.paper_size, config.text_encoding, "PRINTER TEST"),
            PrinterRole::Label => {
                let mut b = TsplBuilder::new();
                b.self_test();
                b.build()
            }
        };
        info!(role = %role, bytes = payload.len(), "Sending test print");
        self.with_session(config, role, move |session| {
            Box::pin(async move { session.send(&payload).await })
        })
        .await
    }

    /// Connect, run `operation` against the open session, close
    ///
    /// The session is closed whatever the operation returns.
    pub async fn print_with_connection<F>(
        &self,
        config: &PrinterConfig,
        role: PrinterRole,
        operation: F,
    ) -> ConnectionResult<()>
    where
        F: for<'s> FnOnce(&'s mut Box<dyn PrinterSession>) -> BoxFuture<'s, PrintResult<()>>
            + Send,
    {
        self.with_session(config, role, operation).await
    }

    async fn with_session<F>(
        &self,
        config: &PrinterConfig,
        role: PrinterRole,
        operation: F,
    ) -> ConnectionResult<()>
    where
        F: for<'s> FnOnce(&'s mut Box<dyn PrinterSession>) -> BoxFuture<'s, PrintResult<()>>
            + Send,
    {
        let slot = self.slot(role);
        let _guard = slot
            .busy
            .try_lock()
            .map_err(|_| ConnectionError::AlreadyInProgress(role))?;

        slot.status.send_replace(ConnectionStatus::Testing);

        let result = async {
            let mut session = self.connect(config, role).await?;
            let target = session.describe();
            let outcome = operation(&mut session).await;
            if let Err(e) = session.close().await {
                warn!(role = %role, target = %target, error = %e, "closing printer session failed");
            }
            outcome.map_err(|e| ConnectionError::Transmission(format!("{}: {}", target, e)))
        }
        .await;

        let status = if result.is_ok() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        slot.status.send_replace(status);

        if let Err(e) = &result {
            debug!(role = %role, error = %e, "printer operation failed");
        }
        result
    }
}

impl std::fmt::Debug for PrinterConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrinterConnectionManager")
            .field("connect_timeout", &self.connect_timeout)
            .field("label", &self.status(PrinterRole::Label))
            .field("bill", &self.status(PrinterRole::Bill))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crab_printer::{Endpoint, PrintError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
        sent: parking_lot::Mutex<Vec<u8>>,
    }

    struct FakeSession(Arc<Counters>);

    #[async_trait]
    impl PrinterSession for FakeSession {
        async fn send(&mut self, data: &[u8]) -> PrintResult<()> {
            self.0.sent.lock().extend_from_slice(data);
            Ok(())
        }
        async fn probe(&mut self) -> PrintResult<()> {
            Ok(())
        }
        async fn close(&mut self) -> PrintResult<()> {
            self.0.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn describe(&self) -> String {
            "fake".into()
        }
    }

    struct FakeConnector {
        counters: Arc<Counters>,
        delay: Duration,
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn open(&self, _endpoint: &Endpoint) -> PrintResult<Box<dyn PrinterSession>> {
            tokio::time::sleep(self.delay).await;
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession(self.counters.clone())))
        }
    }

    fn manager(delay: Duration) -> (PrinterConnectionManager, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let connector = FakeConnector {
            counters: counters.clone(),
            delay,
        };
        (
            PrinterConnectionManager::new(Arc::new(connector)),
            counters,
        )
    }

    #[tokio::test]
    async fn test_invalid_config_never_connects() {
        let (mgr, counters) = manager(Duration::ZERO);
        let err = mgr
            .test_connection(&PrinterConfig::default(), PrinterRole::Label)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Configuration(_)));
        assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.status(PrinterRole::Label), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_session_closed_after_failed_operation() {
        let (mgr, counters) = manager(Duration::ZERO);
        let cfg = PrinterConfig::network("10.0.0.5");
        let err = mgr
            .print_with_connection(&cfg, PrinterRole::Bill, |_session| {
                Box::pin(async { Err(PrintError::Offline("paper out".into())) })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Transmission(_)));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_print_sends_payload_and_reports_connected() {
        let (mgr, counters) = manager(Duration::ZERO);
        let cfg = PrinterConfig::network("10.0.0.5");
        let payload = b"hello".to_vec();
        mgr.print_with_connection(&cfg, PrinterRole::Bill, move |session| {
            Box::pin(async move { session.send(&payload).await })
        })
        .await
        .unwrap();
        assert_eq!(counters.sent.lock().as_slice(), b"hello");
        assert_eq!(mgr.status(PrinterRole::Bill), ConnectionStatus::Connected);
        assert_eq!(mgr.status(PrinterRole::Label), ConnectionStatus::Unknown);
    }

    #[tokio::test]
    async fn test_concurrent_request_rejected() {
        let (mgr, _) = manager(Duration::from_millis(200));
        let mgr = Arc::new(mgr);
        let cfg = PrinterConfig::network("10.0.0.5");

        let first = {
            let mgr = mgr.clone();
            let cfg = cfg.clone();
            tokio::spawn(async move { mgr.test_connection(&cfg, PrinterRole::Label).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mgr.status(PrinterRole::Label), ConnectionStatus::Testing);

        let second = mgr.test_connection(&cfg, PrinterRole::Label).await;
        assert!(matches!(
            second,
            Err(ConnectionError::AlreadyInProgress(PrinterRole::Label))
        ));
        // other role is unaffected
        mgr.test_connection(&cfg, PrinterRole::Bill).await.unwrap();

        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let (mgr, _) = manager(Duration::from_millis(300));
        let mgr = mgr.with_timeout(Duration::from_millis(20));
        let err = mgr
            .test_connection(&PrinterConfig::network("10.0.0.5"), PrinterRole::Bill)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_label_test_print_is_selftest() {
        let (mgr, counters) = manager(Duration::ZERO);
        mgr.test_connection_with_print(&PrinterConfig::network("10.0.0.5"), PrinterRole::Label)
            .await
            .unwrap();
        assert_eq!(counters.sent.lock().as_slice(), b"SELFTEST\r\n");
    }
}
