//! Printer API Handlers
//!
//! Per-role printer configuration, status and explicit tests.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::core::ServerState;
use crate::models::{ConnectionStatus, PrinterConfig, PrinterRole};
use crate::utils::{AppError, AppResponse, AppResult, ok, ok_with_message};

type ApiJson<T> = Json<AppResponse<T>>;

#[derive(Debug, Serialize)]
pub struct PrinterStatuses {
    pub label: ConnectionStatus,
    pub bill: ConnectionStatus,
}

fn configured(state: &ServerState, role: PrinterRole) -> AppResult<PrinterConfig> {
    state
        .storage
        .get_printer_config(role)?
        .ok_or_else(|| AppError::PrinterNotConfigured(format!("{} printer", role)))
}

/// GET /api/printers/status
pub async fn status(State(state): State<ServerState>) -> ApiJson<PrinterStatuses> {
    ok(PrinterStatuses {
        label: state.connections.status(PrinterRole::Label),
        bill: state.connections.status(PrinterRole::Bill),
    })
}

/// GET /api/printers/serial-ports
pub async fn serial_ports() -> ApiJson<Vec<String>> {
    ok(crab_printer::SerialSession::available_ports())
}

/// GET /api/printers/{role}
///
/// Unconfigured roles return the defaults.
pub async fn get(
    State(state): State<ServerState>,
    Path(role): Path<PrinterRole>,
) -> AppResult<ApiJson<PrinterConfig>> {
    let config = state.storage.get_printer_config(role)?.unwrap_or_default();
    Ok(ok(config))
}

/// PUT /api/printers/{role}
///
/// Applies to jobs enqueued afterwards; queued jobs keep their snapshot.
pub async fn update(
    State(state): State<ServerState>,
    Path(role): Path<PrinterRole>,
    Json(config): Json<PrinterConfig>,
) -> AppResult<ApiJson<PrinterConfig>> {
    state.storage.put_printer_config(role, &config)?;
    tracing::info!(
        role = %role,
        connection_type = ?config.connection_type,
        valid = config.is_valid(),
        "Printer config updated"
    );
    Ok(ok(config))
}

/// POST /api/printers/{role}/test
///
/// Connect and probe, no paper used.
pub async fn test(
    State(state): State<ServerState>,
    Path(role): Path<PrinterRole>,
) -> AppResult<ApiJson<ConnectionStatus>> {
    let config = configured(&state, role)?;
    state.connections.test_connection(&config, role).await?;
    Ok(ok_with_message(
        state.connections.status(role),
        format!("{} printer reachable", role),
    ))
}

/// POST /api/printers/{role}/test-print
pub async fn test_print(
    State(state): State<ServerState>,
    Path(role): Path<PrinterRole>,
) -> AppResult<ApiJson<ConnectionStatus>> {
    let config = configured(&state, role)?;
    state
        .connections
        .test_connection_with_print(&config, role)
        .await?;
    Ok(ok_with_message(
        state.connections.status(role),
        format!("{} test page sent", role),
    ))
}
