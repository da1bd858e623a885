//! Test doubles for the print pipeline: a scripted transport factory and a
//! stub renderer.

#![allow(dead_code)]

use async_trait::async_trait;
use crab_printer::{Connector, Endpoint, PrintError, PrintResult, PrinterSession};
use image::DynamicImage;
use parking_lot::Mutex;
use print_hub::models::{CaptureOptions, Order, PrinterConfig, PrinterRole};
use print_hub::printing::{
    PrintQueue, PrintStorage, PrinterConnectionManager, QueueConfig, QueueEvent, RenderError,
    RenderedImage, Renderer,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

pub const LABEL_HOST: &str = "label.test";
pub const BILL_HOST: &str = "bill.test";

/// What the next session for a host does
#[derive(Debug, Clone)]
pub enum Step {
    /// Open fine, send after `delay`
    Ok(Duration),
    /// Refuse to open
    Refuse,
    /// Never finish opening
    Hang,
    /// Open, then fail the send
    SendError,
}

#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    pub sent: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    pub opens: AtomicUsize,
}

impl ScriptedConnector {
    pub fn script(&self, host: &str, steps: impl IntoIterator<Item = Step>) {
        self.scripts
            .lock()
            .entry(host.to_string())
            .or_default()
            .extend(steps);
    }

    pub fn sent_to(&self, host: &str) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, b)| b.clone())
            .collect()
    }

    fn next(&self, host: &str) -> Step {
        self.scripts
            .lock()
            .get_mut(host)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Ok(Duration::ZERO))
    }
}

struct ScriptedSession {
    host: String,
    delay: Duration,
    fail_send: bool,
    sent: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

#[async_trait]
impl PrinterSession for ScriptedSession {
    async fn send(&mut self, data: &[u8]) -> PrintResult<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_send {
            return Err(PrintError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "printer hung up",
            )));
        }
        self.sent.lock().push((self.host.clone(), data.to_vec()));
        Ok(())
    }

    async fn probe(&mut self) -> PrintResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> PrintResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        format!("scripted://{}", self.host)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, endpoint: &Endpoint) -> PrintResult<Box<dyn PrinterSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let host = match endpoint {
            Endpoint::Network { host, .. } => host.clone(),
            other => other.to_string(),
        };

        let (delay, fail_send) = match self.next(&host) {
            Step::Ok(delay) => (delay, false),
            Step::SendError => (Duration::ZERO, true),
            Step::Refuse => return Err(PrintError::Connection(format!("{} refused", host))),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Err(PrintError::Connection("unreachable".into()));
            }
        };

        Ok(Box::new(ScriptedSession {
            host,
            delay,
            fail_send,
            sent: self.sent.clone(),
        }))
    }
}

/// Renders a small solid image and counts captures
#[derive(Default)]
pub struct StubRenderer {
    pub captures: Mutex<Vec<(PrinterRole, String, CaptureOptions)>>,
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn capture(
        &self,
        role: PrinterRole,
        order: &Order,
        options: CaptureOptions,
    ) -> Result<RenderedImage, RenderError> {
        self.captures.lock().push((role, order.id.clone(), options));
        Ok(RenderedImage::new(DynamicImage::new_luma8(64, 32)))
    }
}

pub struct Harness {
    pub queue: PrintQueue,
    pub connector: Arc<ScriptedConnector>,
    pub renderer: Arc<StubRenderer>,
    pub events: broadcast::Receiver<QueueEvent>,
}

pub fn harness(max_retries: u32) -> Harness {
    harness_with(max_retries, true)
}

/// Fast retries and a short connect timeout; workers not started
pub fn harness_with(max_retries: u32, with_renderer: bool) -> Harness {
    let connector = Arc::new(ScriptedConnector::default());
    let connections = Arc::new(
        PrinterConnectionManager::new(connector.clone()).with_timeout(Duration::from_millis(100)),
    );
    let queue = PrintQueue::new(
        QueueConfig {
            max_retries,
            retry_delay: Duration::from_millis(10),
            capture_settle: Duration::ZERO,
            history_limit: 100,
        },
        connections,
        PrintStorage::open_in_memory().expect("in-memory store"),
    );
    let renderer = Arc::new(StubRenderer::default());
    if with_renderer {
        queue.set_renderer(renderer.clone());
    }
    let events = queue.subscribe();
    Harness {
        queue,
        connector,
        renderer,
        events,
    }
}

pub fn label_printer() -> PrinterConfig {
    PrinterConfig::network(LABEL_HOST)
}

pub fn bill_printer() -> PrinterConfig {
    PrinterConfig::network(BILL_HOST)
}

/// Collect events until `done` returns true for one of them
pub async fn collect_until(
    rx: &mut broadcast::Receiver<QueueEvent>,
    mut done: impl FnMut(&QueueEvent) -> bool,
) -> Vec<QueueEvent> {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event stream open");
            let stop = done(&event);
            seen.push(event);
            if stop {
                break;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for events: {:?}", names(&seen));
    seen
}

pub fn names(events: &[QueueEvent]) -> Vec<&'static str> {
    events.iter().map(QueueEvent::name).collect()
}

pub fn count<F: Fn(&QueueEvent) -> bool>(events: &[QueueEvent], f: F) -> usize {
    events.iter().filter(|e| f(e)).count()
}
