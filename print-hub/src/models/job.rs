//! Print job types

use super::order::Order;
use super::printer::{PrinterConfig, PrinterRole};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Request kind accepted by `add_print_task`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Label,
    Bill,
    Both,
}

/// Job state machine
///
/// `queued → processing → {completed | retrying → processing | failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Retrying,
    Completed,
    Failed,
}

/// Which line item and which physical copy a label job prints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelMeta {
    #[serde(default)]
    pub product_index: usize,
    /// 0-based across the whole order
    pub label_index: usize,
    pub total_labels: usize,
    /// 0-based within the line item
    #[serde(
        default,
        rename = "quantityIndexWithinProduct",
        alias = "quantityIndex"
    )]
    pub quantity_index: u32,
    #[serde(default, rename = "quantityTotalForProduct", alias = "quantityTotal")]
    pub quantity_total: u32,
    #[serde(default)]
    pub product_name: String,
}

impl LabelMeta {
    /// Decomposition fields carried flat under a request's `metadata`
    ///
    /// `Ok(None)` when the request is not part of a fan-out (no
    /// `labelIndex`); an error when the fields are present but malformed.
    pub fn from_metadata(
        metadata: &Map<String, Value>,
    ) -> Result<Option<Self>, serde_json::Error> {
        if !metadata.contains_key("labelIndex") {
            return Ok(None);
        }
        serde_json::from_value(Value::Object(metadata.clone())).map(Some)
    }

    /// Footer text, e.g. "2/5"
    pub fn position(&self) -> String {
        format!("{}/{}", self.label_index + 1, self.total_labels)
    }
}

/// Totals printed on a bill
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSummary {
    pub subtotal: Decimal,
    pub service_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// What the capture gateway needs to pick the line item / copy to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    pub product_index: usize,
    pub label_index: usize,
    pub total_labels: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            product_index: 0,
            label_index: 0,
            total_labels: 1,
        }
    }
}

/// 打印任务
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    pub id: String,
    pub role: PrinterRole,
    pub order: Arc<Order>,
    pub printer_config: PrinterConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_meta: Option<LabelMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill: Option<BillSummary>,
    pub status: JobStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// Epoch millis
    pub created_at: i64,
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    /// Carried for the caller; the queue is strictly FIFO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl PrintJob {
    pub fn new(role: PrinterRole, order: Arc<Order>, printer_config: PrinterConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            order,
            printer_config,
            label_meta: None,
            bill: None,
            status: JobStatus::Queued,
            retry_count: 0,
            last_error: None,
            created_at: crate::utils::time::now_millis(),
            completed_at: None,
            parent_task_id: None,
            priority: None,
            metadata: Map::new(),
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        self.label_meta
            .as_ref()
            .map(|m| CaptureOptions {
                product_index: m.product_index,
                label_index: m.label_index,
                total_labels: m.total_labels,
            })
            .unwrap_or_default()
    }

    /// Identifier in the printed-label set: `{order_id}#{label_index}`
    pub fn label_key(&self) -> Option<String> {
        self.label_meta
            .as_ref()
            .map(|m| label_key(&self.order.id, m.label_index))
    }

    /// Back to a fresh queued job, keeping id and payload
    pub fn reset_for_retry(&mut self) {
        self.status = JobStatus::Queued;
        self.retry_count = 0;
        self.last_error = None;
        self.completed_at = None;
    }
}

pub fn label_key(order_id: &str, label_index: usize) -> String {
    format!("{}#{}", order_id, label_index)
}

/// Input of `PrintQueue::add_print_task`
#[derive(Debug, Clone)]
pub struct AddPrintTask {
    pub task_type: TaskType,
    pub order: Arc<Order>,
    /// Config snapshot; `None` uses the stored config for the role
    pub printer_info: Option<PrinterConfig>,
    pub priority: Option<u8>,
    pub metadata: Map<String, Value>,
    pub label_meta: Option<LabelMeta>,
}

impl AddPrintTask {
    pub fn new(task_type: TaskType, order: Arc<Order>) -> Self {
        Self {
            task_type,
            order,
            printer_info: None,
            priority: None,
            metadata: Map::new(),
            label_meta: None,
        }
    }

    pub fn with_printer(mut self, config: PrinterConfig) -> Self {
        self.printer_info = Some(config);
        self
    }
}

/// Result of an enqueue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum EnqueueReceipt {
    Single {
        task_id: String,
    },
    Split {
        label_task_id: String,
        bill_task_id: String,
        parent_task_id: String,
    },
}

/// A terminally failed job as shown to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTaskSummary {
    pub id: String,
    pub role: PrinterRole,
    pub order_id: String,
    pub order_number: String,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub failed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_meta: Option<LabelMeta>,
}

impl From<&PrintJob> for FailedTaskSummary {
    fn from(job: &PrintJob) -> Self {
        Self {
            id: job.id.clone(),
            role: job.role,
            order_id: job.order.id.clone(),
            order_number: job.order.display_number().to_string(),
            retry_count: job.retry_count,
            last_error: job.last_error.clone(),
            created_at: job.created_at,
            failed_at: job.completed_at,
            label_meta: job.label_meta.clone(),
        }
    }
}

/// One entry in the capped print history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub task_id: String,
    pub role: PrinterRole,
    pub order_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub attempt: u32,
    pub at: i64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
