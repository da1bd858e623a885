//! Queue lifecycle events
//!
//! Fanned out on a broadcast channel; the HTTP layer relays them as SSE.

use crate::models::{PrintJob, PrinterRole};
use serde::Serialize;

/// Raised once per job that exhausts its retries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAlert {
    pub order_id: String,
    pub order_number: String,
    pub role: PrinterRole,
    pub error: String,
    /// Attempts the job made
    pub attempts: u32,
    /// Failed tasks currently awaiting retry or clear, this one included.
    /// `None` when the store could not be counted.
    pub failed_count: Option<u64>,
    pub message: String,
}

impl FailureAlert {
    pub fn for_job(job: &PrintJob, failed_count: Option<u64>) -> Self {
        let error = job.last_error.clone().unwrap_or_default();
        let mut message = format!(
            "{} print failed for order {}: {}",
            job.role,
            job.order.display_number(),
            error
        );
        if let Some(n) = failed_count {
            message.push_str(&format!(" ({} failed task(s) pending)", n));
        }
        Self {
            order_id: job.order.id.clone(),
            order_number: job.order.display_number().to_string(),
            role: job.role,
            error,
            attempts: job.retry_count,
            failed_count,
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum QueueEvent {
    TaskAdded {
        queue_type: PrinterRole,
        job: PrintJob,
    },
    TaskProcessing {
        queue_type: PrinterRole,
        job: PrintJob,
    },
    TaskRetrying {
        queue_type: PrinterRole,
        job: PrintJob,
    },
    TaskCompleted {
        queue_type: PrinterRole,
        job: PrintJob,
    },
    TaskFailed {
        queue_type: PrinterRole,
        job: PrintJob,
        alert: FailureAlert,
    },
    ProcessingStarted {
        queue_type: PrinterRole,
    },
    ProcessingCompleted {
        queue_type: PrinterRole,
    },
    /// `queue_type` is `None` when both lanes were cleared
    FailedTasksCleared {
        queue_type: Option<PrinterRole>,
        count: usize,
    },
}

impl QueueEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::TaskAdded { .. } => "taskAdded",
            QueueEvent::TaskProcessing { .. } => "taskProcessing",
            QueueEvent::TaskRetrying { .. } => "taskRetrying",
            QueueEvent::TaskCompleted { .. } => "taskCompleted",
            QueueEvent::TaskFailed { .. } => "taskFailed",
            QueueEvent::ProcessingStarted { .. } => "processingStarted",
            QueueEvent::ProcessingCompleted { .. } => "processingCompleted",
            QueueEvent::FailedTasksCleared { .. } => "failedTasksCleared",
        }
    }
}
