//! Printer library errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrintError {
    /// Transport could not be opened (TCP connect, device node, serial port)
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Session is open but the printer stopped answering
    #[error("Printer offline: {0}")]
    Offline(String),

    /// Endpoint is missing a required address
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type PrintResult<T> = Result<T, PrintError>;
