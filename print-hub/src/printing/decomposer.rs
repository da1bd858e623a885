//! Order-to-jobs decomposition
//!
//! One bill per request; one label per unit of every line's quantity.
//! Indexes are stable: the same order always decomposes to the same
//! sequence, which lets the printed-label set skip copies already printed.

use crate::models::{
    AddPrintTask, BillSummary, LabelMeta, Order, PrinterConfig, TaskType,
};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Upper bound on labels produced for one order
pub const MAX_LABELS_PER_ORDER: usize = 500;

/// Sum of all line quantities
pub fn total_labels(order: &Order) -> usize {
    order
        .lines
        .iter()
        .fold(0usize, |acc, l| acc.saturating_add(l.quantity as usize))
}

/// Expand an order into one [`LabelMeta`] per physical label
///
/// Lines with zero quantity contribute nothing; an empty order yields an
/// empty vec. Output stops at [`MAX_LABELS_PER_ORDER`].
pub fn decompose_labels(order: &Order) -> Vec<LabelMeta> {
    let requested = total_labels(order);
    let total = requested.min(MAX_LABELS_PER_ORDER);
    if requested > total {
        warn!(
            order_id = %order.id,
            requested,
            max = MAX_LABELS_PER_ORDER,
            "Label count over limit, truncating"
        );
    }
    let mut metas = Vec::with_capacity(total);

    'lines: for (product_index, line) in order.lines.iter().enumerate() {
        for quantity_index in 0..line.quantity {
            if metas.len() == total {
                break 'lines;
            }
            metas.push(LabelMeta {
                product_index,
                label_index: metas.len(),
                total_labels: total,
                quantity_index,
                quantity_total: line.quantity,
                product_name: line.name.clone(),
            });
        }
    }

    metas
}

/// Bill totals
///
/// Service fee and discount only apply when present on the order.
pub fn decompose_bill(order: &Order) -> BillSummary {
    let subtotal: Decimal = order.lines.iter().map(|l| l.line_total()).sum();
    let service_fee = order.service_fee.unwrap_or(Decimal::ZERO);
    let discount = order.discount.unwrap_or(Decimal::ZERO);
    BillSummary {
        subtotal,
        service_fee,
        discount,
        total: subtotal + service_fee - discount,
    }
}

/// One `label` task per physical label, flagged as a multi-label run
pub fn label_tasks(order: Arc<Order>, printer_info: Option<PrinterConfig>) -> Vec<AddPrintTask> {
    decompose_labels(&order)
        .into_iter()
        .map(|meta| {
            let mut metadata = Map::new();
            metadata.insert("isMultiLabel".into(), Value::Bool(true));
            if let Ok(Value::Object(fields)) = serde_json::to_value(&meta) {
                metadata.extend(fields);
            }
            AddPrintTask {
                task_type: TaskType::Label,
                order: order.clone(),
                printer_info: printer_info.clone(),
                priority: None,
                metadata,
                label_meta: Some(meta),
            }
        })
        .collect()
}
