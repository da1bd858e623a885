mod common;

use common::*;
use print_hub::models::{
    AddPrintTask, EnqueueReceipt, JobStatus, Order, OrderLine, PrinterConfig, PrinterRole,
    TaskType,
};
use print_hub::printing::QueueEvent;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

fn order(id: &str) -> Arc<Order> {
    Arc::new(Order::new(
        id,
        vec![OrderLine::new("Coffee", 1, Decimal::from(3))],
    ))
}

fn bill_task(id: &str) -> AddPrintTask {
    AddPrintTask::new(TaskType::Bill, order(id)).with_printer(bill_printer())
}

fn label_task(id: &str) -> AddPrintTask {
    AddPrintTask::new(TaskType::Label, order(id)).with_printer(label_printer())
}

fn is_completed(e: &QueueEvent) -> bool {
    matches!(e, QueueEvent::TaskCompleted { .. })
}

fn is_failed(e: &QueueEvent) -> bool {
    matches!(e, QueueEvent::TaskFailed { .. })
}

#[tokio::test]
async fn test_succeeds_after_transient_failures() {
    let mut h = harness(3);
    h.connector
        .script(BILL_HOST, [Step::Refuse, Step::SendError, Step::Ok(Duration::ZERO)]);
    h.queue.start();

    h.queue.add_print_task(bill_task("o-1")).unwrap();
    let events = collect_until(&mut h.events, is_completed).await;

    let Some(QueueEvent::TaskCompleted { job, .. }) = events.last() else {
        panic!("expected completion");
    };
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.retry_count, 2);
    assert!(job.completed_at.is_some());
    assert_eq!(count(&events, |e| matches!(e, QueueEvent::TaskRetrying { .. })), 2);
    assert_eq!(count(&events, is_failed), 0);

    assert!(h.queue.list_failed().unwrap().is_empty());
    assert_eq!(h.connector.sent_to(BILL_HOST).len(), 1);

    let history = h.queue.history(10).unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[0].success);
    assert_eq!(history[0].attempt, 3);
    assert!(!history[1].success);

    h.queue.shutdown().await;
}

#[tokio::test]
async fn test_exhausted_retries_move_job_to_failed_store() {
    let mut h = harness(3);
    h.connector.script(BILL_HOST, [Step::Refuse, Step::Refuse, Step::Refuse]);
    h.queue.start();

    let EnqueueReceipt::Single { task_id } = h.queue.add_print_task(bill_task("o-2")).unwrap()
    else {
        panic!("expected single receipt");
    };
    let mut events = collect_until(&mut h.events, is_failed).await;
    events.extend(collect_until(&mut h.events, |e| {
        matches!(e, QueueEvent::ProcessingCompleted { .. })
    })
    .await);

    assert_eq!(count(&events, is_failed), 1);
    let alert = events
        .iter()
        .find_map(|e| match e {
            QueueEvent::TaskFailed { alert, .. } => Some(alert.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(alert.order_id, "o-2");
    assert_eq!(alert.role, PrinterRole::Bill);
    assert_eq!(alert.attempts, 3);
    assert_eq!(alert.failed_count, Some(1));
    assert!(alert.error.contains("refused"), "{}", alert.error);

    assert_eq!(h.queue.queue_len(PrinterRole::Bill), 0);
    let failed = h.queue.list_failed().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, task_id);
    assert_eq!(failed[0].status, JobStatus::Failed);
    assert_eq!(failed[0].retry_count, 3);
    assert_eq!(h.connector.opens.load(std::sync::atomic::Ordering::SeqCst), 3);

    h.queue.shutdown().await;
}

#[tokio::test]
async fn test_fifo_within_a_role_regardless_of_latency() {
    let mut h = harness(3);
    h.connector.script(
        BILL_HOST,
        [
            Step::Ok(Duration::from_millis(60)),
            Step::Ok(Duration::ZERO),
            Step::Ok(Duration::from_millis(20)),
        ],
    );
    h.queue.start();

    let mut ids = Vec::new();
    for n in 0..3 {
        let EnqueueReceipt::Single { task_id } =
            h.queue.add_print_task(bill_task(&format!("o-{}", n))).unwrap()
        else {
            panic!("expected single receipt");
        };
        ids.push(task_id);
    }

    let mut completed = Vec::new();
    while completed.len() < 3 {
        let events = collect_until(&mut h.events, is_completed).await;
        if let Some(QueueEvent::TaskCompleted { job, .. }) = events.last() {
            completed.push(job.id.clone());
        }
    }
    assert_eq!(completed, ids);

    h.queue.shutdown().await;
}

#[tokio::test]
async fn test_head_retry_blocks_the_rest_of_its_lane() {
    let mut h = harness(2);
    h.connector.script(BILL_HOST, [Step::Refuse, Step::Refuse]);
    h.queue.start();

    h.queue.add_print_task(bill_task("first")).unwrap();
    h.queue.add_print_task(bill_task("second")).unwrap();

    let events = collect_until(&mut h.events, is_completed).await;
    let failed_at = events.iter().position(is_failed).expect("first job failed");
    let completed_at = events.iter().position(is_completed).unwrap();
    assert!(failed_at < completed_at);
    let Some(QueueEvent::TaskCompleted { job, .. }) = events.last() else {
        unreachable!()
    };
    assert_eq!(job.order.id, "second");

    h.queue.shutdown().await;
}

#[tokio::test]
async fn test_retry_all_requeues_with_fresh_counters() {
    let mut h = harness(1);
    h.connector.script(BILL_HOST, [Step::Refuse, Step::Refuse]);
    h.queue.start();

    h.queue.add_print_task(bill_task("a")).unwrap();
    h.queue.add_print_task(bill_task("b")).unwrap();
    collect_until(&mut h.events, is_failed).await;
    collect_until(&mut h.events, is_failed).await;
    h.queue.shutdown().await;

    assert_eq!(h.queue.list_failed().unwrap().len(), 2);
    assert_eq!(h.queue.retry_all_failed().unwrap(), 2);
    assert!(h.queue.list_failed().unwrap().is_empty());

    let queued = h.queue.queue_snapshot(PrinterRole::Bill);
    assert_eq!(queued.len(), 2);
    for job in &queued {
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.retry_count, 0);
        assert!(job.last_error.is_none());
    }
    let mut order_ids: Vec<_> = queued.iter().map(|j| j.order.id.as_str()).collect();
    order_ids.sort();
    assert_eq!(order_ids, vec!["a", "b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retry_all_while_workers_fail_loses_nothing() {
    let h = harness_with(1, false);
    h.queue.start();

    for n in 0..150 {
        h.queue.add_print_task(bill_task(&format!("b{}", n))).unwrap();
        h.queue.add_print_task(label_task(&format!("l{}", n))).unwrap();
    }
    for _ in 0..200 {
        h.queue.retry_all_failed().unwrap();
        tokio::task::yield_now().await;
    }

    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let idle = h.queue.queue_len(PrinterRole::Bill) == 0
                && h.queue.queue_len(PrinterRole::Label) == 0;
            if idle && h.queue.list_failed().unwrap().len() == 300 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(
        settled.is_ok(),
        "failed store holds {} of 300 jobs",
        h.queue.list_failed().unwrap().len()
    );

    h.queue.shutdown().await;
}

#[tokio::test]
async fn test_retry_one_and_clear_failed() {
    let mut h = harness(1);
    h.connector.script(BILL_HOST, [Step::Refuse, Step::Refuse]);
    h.queue.start();

    h.queue.add_print_task(bill_task("a")).unwrap();
    h.queue.add_print_task(bill_task("b")).unwrap();
    collect_until(&mut h.events, is_failed).await;
    collect_until(&mut h.events, is_failed).await;

    let failed = h.queue.list_failed().unwrap();
    let (a, b) = (failed[0].id.clone(), failed[1].id.clone());

    // printer is back; a reprints
    assert!(h.queue.retry_failed(&a).unwrap());
    let events = collect_until(&mut h.events, is_completed).await;
    let Some(QueueEvent::TaskCompleted { job, .. }) = events.last() else {
        unreachable!()
    };
    assert_eq!(job.id, a);
    assert_eq!(job.retry_count, 0);

    assert!(h.queue.clear_failed(&b).unwrap());
    let events = collect_until(&mut h.events, |e| {
        matches!(e, QueueEvent::FailedTasksCleared { .. })
    })
    .await;
    assert!(matches!(
        events.last(),
        Some(QueueEvent::FailedTasksCleared {
            queue_type: Some(PrinterRole::Bill),
            count: 1
        })
    ));
    assert!(h.queue.list_failed().unwrap().is_empty());
    assert!(!h.queue.clear_failed(&b).unwrap());

    h.queue.shutdown().await;
}

#[tokio::test]
async fn test_missing_host_fails_with_configuration_error() {
    let mut h = harness(3);
    h.queue.start();

    let task = AddPrintTask::new(TaskType::Label, order("o-cfg"))
        .with_printer(PrinterConfig::network(""));
    h.queue.add_print_task(task).unwrap();

    let events = collect_until(&mut h.events, is_failed).await;
    let retrying: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            QueueEvent::TaskRetrying { job, .. } => job.last_error.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(retrying.len(), 2);
    assert!(retrying.iter().all(|m| m.contains("configuration")));

    let failed = h.queue.list_failed().unwrap();
    assert_eq!(failed[0].role, PrinterRole::Label);
    assert!(failed[0].last_error.as_deref().unwrap().contains("configuration"));
    // never reached the transport or the renderer
    assert_eq!(h.connector.opens.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(h.renderer.captures.lock().is_empty());

    h.queue.shutdown().await;
}

#[tokio::test]
async fn test_label_transmission_timeout_vs_bill_success() {
    let mut h = harness(2);
    h.connector.script(LABEL_HOST, [Step::Hang, Step::Hang]);
    h.queue.start();

    h.queue.add_print_task(label_task("o-l")).unwrap();
    h.queue.add_print_task(bill_task("o-b")).unwrap();

    let mut bill_completed = false;
    let mut label_failed = None;
    while !(bill_completed && label_failed.is_some()) {
        let events = collect_until(&mut h.events, |e| is_completed(e) || is_failed(e)).await;
        match events.last() {
            Some(QueueEvent::TaskCompleted { queue_type, .. }) => {
                assert_eq!(*queue_type, PrinterRole::Bill);
                bill_completed = true;
            }
            Some(QueueEvent::TaskFailed { queue_type, job, .. }) => {
                assert_eq!(*queue_type, PrinterRole::Label);
                label_failed = job.last_error.clone();
            }
            _ => unreachable!(),
        }
    }
    assert!(label_failed.unwrap().contains("timed out"));
    assert_eq!(h.connector.sent_to(BILL_HOST).len(), 1);
    assert!(h.connector.sent_to(LABEL_HOST).is_empty());

    h.queue.shutdown().await;
}

#[tokio::test]
async fn test_missing_renderer_is_a_render_failure() {
    let mut h = harness_with(1, false);
    h.queue.start();

    h.queue.add_print_task(bill_task("o-r")).unwrap();
    collect_until(&mut h.events, is_failed).await;

    let failed = h.queue.list_failed().unwrap();
    assert!(
        failed[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("no capture callback registered")
    );
    assert_eq!(h.connector.opens.load(std::sync::atomic::Ordering::SeqCst), 0);

    h.queue.shutdown().await;
}

#[tokio::test]
async fn test_processing_lifecycle_events() {
    let mut h = harness(3);
    h.queue.start();

    h.queue.add_print_task(label_task("o-ev")).unwrap();
    let events = collect_until(&mut h.events, |e| {
        matches!(e, QueueEvent::ProcessingCompleted { .. })
    })
    .await;
    assert_eq!(
        names(&events),
        vec![
            "taskAdded",
            "processingStarted",
            "taskProcessing",
            "taskCompleted",
            "processingCompleted"
        ]
    );

    h.queue.shutdown().await;
}
