//! Print pipeline errors

use crate::models::PrinterRole;
use crab_printer::PrintError;
use std::time::Duration;
use thiserror::Error;

use super::renderer::RenderError;

/// Connection manager errors
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Address required by the connection type is missing
    #[error("Printer configuration error: {0}")]
    Configuration(String),

    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// Transport could not be opened
    #[error("Connection refused: {0}")]
    Refused(String),

    /// Session opened but the operation failed
    #[error("Transmission failed: {0}")]
    Transmission(String),

    #[error("{0} printer is busy with another request")]
    AlreadyInProgress(PrinterRole),
}

impl ConnectionError {
    /// Map a failure to open a session
    pub(crate) fn from_open(err: PrintError) -> Self {
        match err {
            PrintError::InvalidConfig(msg) => ConnectionError::Configuration(msg),
            PrintError::Connection(msg) | PrintError::Offline(msg) => {
                ConnectionError::Refused(msg)
            }
            other => ConnectionError::Refused(other.to_string()),
        }
    }
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Why a job attempt failed
#[derive(Debug, Error)]
pub enum PrintJobError {
    #[error("Printer configuration error: {0}")]
    Configuration(String),

    #[error("Connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Render failed: {0}")]
    RenderFailure(#[from] RenderError),

    #[error("Transmission failed: {0}")]
    TransmissionFailure(String),

    #[error("{0} printer is busy with another request")]
    AlreadyInProgress(PrinterRole),
}

impl From<ConnectionError> for PrintJobError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Configuration(m) => PrintJobError::Configuration(m),
            ConnectionError::Timeout(d) => PrintJobError::ConnectionTimeout(d),
            ConnectionError::Refused(m) => PrintJobError::ConnectionRefused(m),
            ConnectionError::Transmission(m) => PrintJobError::TransmissionFailure(m),
            ConnectionError::AlreadyInProgress(r) => PrintJobError::AlreadyInProgress(r),
        }
    }
}
