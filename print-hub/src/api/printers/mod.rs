//! Printer API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/printers", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/status", get(handler::status))
        .route("/serial-ports", get(handler::serial_ports))
        .route("/{role}", get(handler::get).put(handler::update))
        .route("/{role}/test", post(handler::test))
        .route("/{role}/test-print", post(handler::test_print))
}
