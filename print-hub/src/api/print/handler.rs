//! Print Queue API Handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;

use crate::core::ServerState;
use crate::models::{
    AddPrintTask, EnqueueReceipt, FailedTaskSummary, HistoryEntry, PrintJob, PrinterConfig,
    PrinterRole, TaskType, normalize_order,
};
use crate::printing::{MAX_LABELS_PER_ORDER, PrintStorageStats, total_labels};
use crate::utils::{AppError, AppResponse, AppResult, ok, ok_with_message};

type ApiJson<T> = Json<AppResponse<T>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTaskRequest {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Raw order in either source shape
    pub order: Value,
    #[serde(default)]
    pub printer_info: Option<PrinterConfig>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLabelsRequest {
    pub order: Value,
    #[serde(default)]
    pub printer_info: Option<PrinterConfig>,
    #[serde(default)]
    pub skip_printed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLabelsResponse {
    pub task_ids: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct QueueSnapshot {
    pub label: Vec<PrintJob>,
    pub bill: Vec<PrintJob>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// POST /api/print/tasks
pub async fn add_task(
    State(state): State<ServerState>,
    Json(req): Json<AddTaskRequest>,
) -> AppResult<ApiJson<EnqueueReceipt>> {
    let order = normalize_order(&req.order);
    if order.id.is_empty() {
        return Err(AppError::Validation("order id is required".into()));
    }

    let mut task = AddPrintTask::new(req.task_type, Arc::new(order));
    task.printer_info = req.printer_info;
    task.priority = req.priority;
    task.metadata = req.metadata;

    let receipt = state.queue.add_print_task(task)?;
    Ok(ok(receipt))
}

/// POST /api/print/orders/labels
///
/// One label job per physical label of the order.
pub async fn add_order_labels(
    State(state): State<ServerState>,
    Json(req): Json<OrderLabelsRequest>,
) -> AppResult<ApiJson<OrderLabelsResponse>> {
    let order = normalize_order(&req.order);
    if order.id.is_empty() {
        return Err(AppError::Validation("order id is required".into()));
    }
    let labels = total_labels(&order);
    if labels > MAX_LABELS_PER_ORDER {
        return Err(AppError::Validation(format!(
            "order needs {} labels, at most {} allowed",
            labels, MAX_LABELS_PER_ORDER
        )));
    }

    let task_ids =
        state
            .queue
            .add_order_labels(Arc::new(order), req.printer_info, req.skip_printed)?;
    Ok(ok(OrderLabelsResponse {
        count: task_ids.len(),
        task_ids,
    }))
}

/// GET /api/print/queue
pub async fn queue(State(state): State<ServerState>) -> ApiJson<QueueSnapshot> {
    ok(QueueSnapshot {
        label: state.queue.queue_snapshot(PrinterRole::Label),
        bill: state.queue.queue_snapshot(PrinterRole::Bill),
    })
}

/// GET /api/print/failed
pub async fn list_failed(
    State(state): State<ServerState>,
) -> AppResult<ApiJson<Vec<FailedTaskSummary>>> {
    let failed = state.queue.list_failed()?;
    Ok(ok(failed.iter().map(FailedTaskSummary::from).collect()))
}

/// POST /api/print/failed/retry
pub async fn retry_all_failed(
    State(state): State<ServerState>,
) -> AppResult<ApiJson<CountResponse>> {
    let count = state.queue.retry_all_failed()?;
    Ok(ok(CountResponse { count }))
}

/// POST /api/print/failed/{id}/retry
pub async fn retry_failed(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiJson<String>> {
    if !state.queue.retry_failed(&id)? {
        return Err(AppError::NotFound(format!("failed task {}", id)));
    }
    Ok(ok_with_message(id, "Task re-queued"))
}

/// DELETE /api/print/failed
pub async fn clear_all_failed(
    State(state): State<ServerState>,
) -> AppResult<ApiJson<CountResponse>> {
    let count = state.queue.clear_all_failed()?;
    Ok(ok(CountResponse { count }))
}

/// DELETE /api/print/failed/{id}
pub async fn clear_failed(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiJson<String>> {
    if !state.queue.clear_failed(&id)? {
        return Err(AppError::NotFound(format!("failed task {}", id)));
    }
    Ok(ok_with_message(id, "Task cleared"))
}

/// GET /api/print/history?limit=N
pub async fn history(
    State(state): State<ServerState>,
    Query(q): Query<HistoryQuery>,
) -> AppResult<ApiJson<Vec<HistoryEntry>>> {
    let limit = q
        .limit
        .unwrap_or(state.config.history_limit)
        .min(state.config.history_limit);
    Ok(ok(state.queue.history(limit)?))
}

/// GET /api/print/stats
pub async fn stats(State(state): State<ServerState>) -> AppResult<ApiJson<PrintStorageStats>> {
    Ok(ok(state.storage.get_stats()?))
}

/// GET /api/print/events
///
/// Server-sent queue events. Slow clients skip what they missed.
pub async fn events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.queue.subscribe();
    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = match Event::default().event(event.name()).json_data(&event) {
                        Ok(sse) => sse,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to encode queue event");
                            continue;
                        }
                    };
                    return Some((Ok(sse), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "SSE client lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
