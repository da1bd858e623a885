//! Print Queue API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/print", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/tasks", post(handler::add_task))
        .route("/orders/labels", post(handler::add_order_labels))
        .route("/queue", get(handler::queue))
        .route(
            "/failed",
            get(handler::list_failed).delete(handler::clear_all_failed),
        )
        .route("/failed/retry", post(handler::retry_all_failed))
        .route("/failed/{id}", axum::routing::delete(handler::clear_failed))
        .route("/failed/{id}/retry", post(handler::retry_failed))
        .route("/history", get(handler::history))
        .route("/stats", get(handler::stats))
        .route("/events", get(handler::events))
}
