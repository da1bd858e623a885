//! Print Job Queue Engine
//!
//! Two strict-FIFO lanes, one per printer role, each drained by its own
//! worker task. A lane's head is retried in place until it completes or
//! exhausts its retries; nothing behind it advances meanwhile. The lanes
//! are independent: a stuck label printer never delays bills.

use super::connection::PrinterConnectionManager;
use super::decomposer::{decompose_bill, label_tasks};
use super::error::PrintJobError;
use super::events::{FailureAlert, QueueEvent};
use super::payload::encode_job;
use super::renderer::{RenderError, Renderer};
use super::storage::{PrintStorage, PrintStorageResult};
use crate::models::{
    AddPrintTask, EnqueueReceipt, HistoryEntry, JobStatus, LabelMeta, Order, PrintJob,
    PrinterConfig, PrinterRole, TaskType, label_key,
};
use crate::utils::time::now_millis;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

const EVENT_CAPACITY: usize = 256;

/// Queue tuning
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Attempts before a job is moved to the failed store
    pub max_retries: u32,
    /// Pause between attempts on the same head job
    pub retry_delay: Duration,
    /// Pause after a capture before transmitting
    pub capture_settle: Duration,
    pub history_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            capture_settle: Duration::ZERO,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

struct Lane {
    role: PrinterRole,
    jobs: Mutex<VecDeque<PrintJob>>,
    notify: Notify,
}

impl Lane {
    fn new(role: PrinterRole) -> Self {
        Self {
            role,
            jobs: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    fn head(&self) -> Option<PrintJob> {
        self.jobs.lock().front().cloned()
    }

    fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    fn replace_head(&self, job: &PrintJob) {
        if let Some(head) = self.jobs.lock().front_mut().filter(|h| h.id == job.id) {
            *head = job.clone();
        }
    }

    fn pop_head(&self, id: &str) {
        let mut jobs = self.jobs.lock();
        if jobs.front().is_some_and(|h| h.id == id) {
            jobs.pop_front();
        }
    }
}

struct Inner {
    config: QueueConfig,
    lanes: [Lane; 2],
    renderer: RwLock<Option<Arc<dyn Renderer>>>,
    connections: Arc<PrinterConnectionManager>,
    storage: PrintStorage,
    events: broadcast::Sender<QueueEvent>,
}

/// 打印队列
pub struct PrintQueue {
    inner: Arc<Inner>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PrintQueue {
    pub fn new(
        config: QueueConfig,
        connections: Arc<PrinterConnectionManager>,
        storage: PrintStorage,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                lanes: [Lane::new(PrinterRole::Label), Lane::new(PrinterRole::Bill)],
                renderer: RwLock::new(None),
                connections,
                storage,
                events,
            }),
            shutdown: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Register the capture callback; replaces any previous one
    pub fn set_renderer(&self, renderer: Arc<dyn Renderer>) {
        *self.inner.renderer.write() = Some(renderer);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    pub fn connections(&self) -> &Arc<PrinterConnectionManager> {
        &self.inner.connections
    }

    pub fn storage(&self) -> &PrintStorage {
        &self.inner.storage
    }

    /// Spawn one worker per lane. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return;
        }
        for role in PrinterRole::ALL {
            let inner = self.inner.clone();
            let shutdown = self.shutdown.clone();
            workers.push(tokio::spawn(async move {
                inner.run_lane(role, shutdown).await;
            }));
        }
        info!("Print queue started");
    }

    /// Stop both workers, interrupting any backoff wait
    ///
    /// Jobs still queued stay in memory and are not persisted.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "print worker terminated abnormally");
            }
        }
        info!("Print queue stopped");
    }

    /// Enqueue a request
    ///
    /// `both` is split into one label job and one bill job sharing a
    /// `parent_task_id`. Without `printer_info` the stored config for the
    /// role is snapshotted.
    pub fn add_print_task(&self, task: AddPrintTask) -> PrintStorageResult<EnqueueReceipt> {
        match task.task_type {
            TaskType::Label => {
                let job = self.build_job(PrinterRole::Label, &task)?;
                Ok(EnqueueReceipt::Single {
                    task_id: self.inner.enqueue(job),
                })
            }
            TaskType::Bill => {
                let job = self.build_job(PrinterRole::Bill, &task)?;
                Ok(EnqueueReceipt::Single {
                    task_id: self.inner.enqueue(job),
                })
            }
            TaskType::Both => {
                let parent_task_id = uuid::Uuid::new_v4().to_string();
                let mut label = self.build_job(PrinterRole::Label, &task)?;
                let mut bill = self.build_job(PrinterRole::Bill, &task)?;
                label.parent_task_id = Some(parent_task_id.clone());
                bill.parent_task_id = Some(parent_task_id.clone());
                Ok(EnqueueReceipt::Split {
                    label_task_id: self.inner.enqueue(label),
                    bill_task_id: self.inner.enqueue(bill),
                    parent_task_id,
                })
            }
        }
    }

    /// Decompose an order and enqueue one label job per physical label
    ///
    /// With `skip_printed`, labels already in the printed-label set are left
    /// out. Returns the ids of the enqueued jobs in label order.
    pub fn add_order_labels(
        &self,
        order: Arc<Order>,
        printer_info: Option<PrinterConfig>,
        skip_printed: bool,
    ) -> PrintStorageResult<Vec<String>> {
        let tasks = label_tasks(order.clone(), printer_info);
        let total = tasks.len();

        // every lookup happens before the first enqueue, so an error leaves
        // the lane untouched
        let mut jobs = Vec::with_capacity(total);
        for task in tasks {
            if skip_printed {
                if let Some(meta) = &task.label_meta {
                    if self
                        .inner
                        .storage
                        .is_label_printed(&label_key(&order.id, meta.label_index))?
                    {
                        continue;
                    }
                }
            }
            jobs.push(self.build_job(PrinterRole::Label, &task)?);
        }
        let ids: Vec<String> = jobs.into_iter().map(|job| self.inner.enqueue(job)).collect();

        info!(
            order_id = %order.id,
            total_labels = total,
            enqueued = ids.len(),
            "Order labels enqueued"
        );
        Ok(ids)
    }

    /// Jobs currently in a lane, head first
    pub fn queue_snapshot(&self, role: PrinterRole) -> Vec<PrintJob> {
        self.inner.lane(role).jobs.lock().iter().cloned().collect()
    }

    pub fn queue_len(&self, role: PrinterRole) -> usize {
        self.inner.lane(role).jobs.lock().len()
    }

    pub fn list_failed(&self) -> PrintStorageResult<Vec<PrintJob>> {
        self.inner.storage.list_failed()
    }

    /// Move one failed job back to the tail of its lane
    pub fn retry_failed(&self, id: &str) -> PrintStorageResult<bool> {
        let Some(mut job) = self.inner.storage.remove_failed(id)? else {
            return Ok(false);
        };
        job.reset_for_retry();
        info!(task_id = %job.id, role = %job.role, "Retrying failed print task");
        self.inner.enqueue(job);
        Ok(true)
    }

    /// Re-enqueue every failed job, oldest failure first
    pub fn retry_all_failed(&self) -> PrintStorageResult<usize> {
        let jobs = self.inner.storage.take_all_failed()?;
        let count = jobs.len();
        for mut job in jobs {
            job.reset_for_retry();
            self.inner.enqueue(job);
        }
        if count > 0 {
            info!(count, "Retrying all failed print tasks");
        }
        Ok(count)
    }

    /// Drop one failed job without reprinting
    pub fn clear_failed(&self, id: &str) -> PrintStorageResult<bool> {
        let Some(job) = self.inner.storage.remove_failed(id)? else {
            return Ok(false);
        };
        self.inner.emit(QueueEvent::FailedTasksCleared {
            queue_type: Some(job.role),
            count: 1,
        });
        Ok(true)
    }

    /// Drop every failed job without reprinting
    pub fn clear_all_failed(&self) -> PrintStorageResult<usize> {
        let count = self.inner.storage.clear_all_failed()?;
        if count > 0 {
            self.inner.emit(QueueEvent::FailedTasksCleared {
                queue_type: None,
                count,
            });
        }
        Ok(count)
    }

    /// Most recent attempts first
    pub fn history(&self, limit: usize) -> PrintStorageResult<Vec<HistoryEntry>> {
        self.inner.storage.list_history(limit)
    }

    /// Append an attempt to the capped history
    pub fn record_attempt(
        &self,
        job: &PrintJob,
        success: bool,
        error: Option<String>,
        metadata: Map<String, Value>,
    ) -> PrintStorageResult<()> {
        self.inner.record_attempt(job, success, error, metadata)
    }

    fn build_job(&self, role: PrinterRole, task: &AddPrintTask) -> PrintStorageResult<PrintJob> {
        let config = match &task.printer_info {
            Some(cfg) => cfg.clone(),
            None => self
                .inner
                .storage
                .get_printer_config(role)?
                .unwrap_or_default(),
        };

        let mut job = PrintJob::new(role, task.order.clone(), config);
        job.priority = task.priority;
        job.metadata = task.metadata.clone();
        match role {
            PrinterRole::Label => {
                job.label_meta = match &task.label_meta {
                    Some(meta) => Some(meta.clone()),
                    None => LabelMeta::from_metadata(&task.metadata).unwrap_or_else(|e| {
                        warn!(
                            order_id = %task.order.id,
                            error = %e,
                            "Ignoring malformed label metadata"
                        );
                        None
                    }),
                };
            }
            PrinterRole::Bill => job.bill = Some(decompose_bill(&task.order)),
        }
        Ok(job)
    }
}

impl Inner {
    fn lane(&self, role: PrinterRole) -> &Lane {
        &self.lanes[role.index()]
    }

    fn emit(&self, event: QueueEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn enqueue(&self, job: PrintJob) -> String {
        let id = job.id.clone();
        let lane = self.lane(job.role);
        debug!(task_id = %id, role = %lane.role, order_id = %job.order.id, "Print task queued");

        {
            // announce before the worker can see it
            let mut jobs = lane.jobs.lock();
            jobs.push_back(job.clone());
            self.emit(QueueEvent::TaskAdded {
                queue_type: lane.role,
                job,
            });
        }
        lane.notify.notify_one();
        id
    }

    fn record_attempt(
        &self,
        job: &PrintJob,
        success: bool,
        error: Option<String>,
        metadata: Map<String, Value>,
    ) -> PrintStorageResult<()> {
        let entry = HistoryEntry {
            task_id: job.id.clone(),
            role: job.role,
            order_id: job.order.id.clone(),
            success,
            error,
            attempt: if success {
                job.retry_count + 1
            } else {
                job.retry_count
            },
            at: now_millis(),
            metadata,
        };
        self.storage.append_history(&entry, self.config.history_limit)
    }

    async fn run_lane(self: Arc<Self>, role: PrinterRole, shutdown: CancellationToken) {
        let lane = self.lane(role);
        info!(role = %role, "Print worker started");

        loop {
            if lane.is_empty() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = lane.notify.notified() => continue,
                }
            }

            self.emit(QueueEvent::ProcessingStarted { queue_type: role });
            let mut interrupted = false;
            while let Some(job) = lane.head() {
                if shutdown.is_cancelled() || !self.process_head(lane, job, &shutdown).await {
                    interrupted = true;
                    break;
                }
            }
            self.emit(QueueEvent::ProcessingCompleted { queue_type: role });

            if interrupted {
                break;
            }
        }

        info!(role = %role, "Print worker stopped");
    }

    /// One attempt on the lane's head. Returns `false` if shutdown
    /// interrupted the backoff.
    async fn process_head(
        &self,
        lane: &Lane,
        mut job: PrintJob,
        shutdown: &CancellationToken,
    ) -> bool {
        job.status = JobStatus::Processing;
        lane.replace_head(&job);
        self.emit(QueueEvent::TaskProcessing {
            queue_type: lane.role,
            job: job.clone(),
        });

        match self.attempt(&job).await {
            Ok(()) => {
                job.status = JobStatus::Completed;
                job.completed_at = Some(now_millis());
                lane.pop_head(&job.id);

                if let Err(e) = self.record_attempt(&job, true, None, job.metadata.clone()) {
                    error!(task_id = %job.id, error = %e, "Failed to record print history");
                }
                if let Some(key) = job.label_key() {
                    if let Err(e) = self.storage.mark_label_printed(&key, now_millis()) {
                        error!(label = %key, error = %e, "Failed to mark label printed");
                    }
                }

                info!(
                    task_id = %job.id,
                    role = %lane.role,
                    order_id = %job.order.id,
                    attempts = job.retry_count + 1,
                    "Print task completed"
                );
                self.emit(QueueEvent::TaskCompleted {
                    queue_type: lane.role,
                    job,
                });
                true
            }
            Err(err) => {
                job.retry_count += 1;
                job.last_error = Some(err.to_string());
                if let Err(e) =
                    self.record_attempt(&job, false, job.last_error.clone(), job.metadata.clone())
                {
                    error!(task_id = %job.id, error = %e, "Failed to record print history");
                }

                if job.retry_count >= self.config.max_retries {
                    self.fail(lane, job);
                    return true;
                }

                debug!(
                    task_id = %job.id,
                    role = %lane.role,
                    retry_count = job.retry_count,
                    error = %err,
                    "Print attempt failed, retrying"
                );
                job.status = JobStatus::Retrying;
                lane.replace_head(&job);
                self.emit(QueueEvent::TaskRetrying {
                    queue_type: lane.role,
                    job,
                });

                tokio::select! {
                    _ = tokio::time::sleep(self.config.retry_delay) => true,
                    _ = shutdown.cancelled() => false,
                }
            }
        }
    }

    fn fail(&self, lane: &Lane, mut job: PrintJob) {
        job.status = JobStatus::Failed;
        job.completed_at = Some(now_millis());
        lane.pop_head(&job.id);

        if let Err(e) = self.storage.save_failed(&job) {
            error!(task_id = %job.id, error = %e, "Failed to persist failed print task");
        }
        let failed_count = match self.storage.failed_count() {
            Ok(n) => Some(n),
            Err(e) => {
                error!(error = %e, "Failed to count failed print tasks");
                None
            }
        };

        let alert = FailureAlert::for_job(&job, failed_count);
        warn!(
            task_id = %job.id,
            role = %lane.role,
            order_id = %alert.order_id,
            attempts = alert.attempts,
            failed_count = ?alert.failed_count,
            error = %alert.error,
            "{}",
            alert.message
        );
        self.emit(QueueEvent::TaskFailed {
            queue_type: lane.role,
            job,
            alert,
        });
    }

    async fn attempt(&self, job: &PrintJob) -> Result<(), PrintJobError> {
        job.printer_config
            .endpoint()
            .map_err(|msg| PrintJobError::Configuration(format!("{} printer: {}", job.role, msg)))?;

        let renderer = self
            .renderer
            .read()
            .clone()
            .ok_or(RenderError::NotRegistered)?;
        let image = renderer
            .capture(job.role, &job.order, job.capture_options())
            .await?;

        if !self.config.capture_settle.is_zero() {
            tokio::time::sleep(self.config.capture_settle).await;
        }

        let payload = encode_job(job, &image);
        debug!(task_id = %job.id, bytes = payload.len(), "Transmitting print job");
        self.connections
            .print_with_connection(&job.printer_config, job.role, move |session| {
                Box::pin(async move { session.send(&payload).await })
            })
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for PrintQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintQueue")
            .field("config", &self.inner.config)
            .field("label_queue", &self.queue_len(PrinterRole::Label))
            .field("bill_queue", &self.queue_len(PrinterRole::Bill))
            .finish()
    }
}

impl Drop for PrintQueue {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
