//! Printer transports
//!
//! Supports:
//! - Network printers (raw TCP, port 9100)
//! - USB printer-class devices (`/dev/usb/lp0` and friends)
//! - Serial printers (RS-232 / USB-serial adapters)
//!
//! A session is opened per job and closed right after; nothing here keeps
//! a connection alive.

use crate::error::{PrintError, PrintResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

/// Where a printer lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Endpoint {
    Network { host: String, port: u16 },
    Usb { device: String },
    Serial { port: String, baud_rate: u32 },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Network { host, port } => write!(f, "tcp://{}:{}", host, port),
            Endpoint::Usb { device } => write!(f, "usb://{}", device),
            Endpoint::Serial { port, baud_rate } => write!(f, "serial://{}@{}", port, baud_rate),
        }
    }
}

/// An open connection to one printer
#[async_trait]
pub trait PrinterSession: Send {
    /// Write raw command bytes
    async fn send(&mut self, data: &[u8]) -> PrintResult<()>;

    /// Cheap liveness check that consumes no media
    async fn probe(&mut self) -> PrintResult<()>;

    /// Flush and release the connection
    async fn close(&mut self) -> PrintResult<()>;

    /// Human readable target, for logs
    fn describe(&self) -> String;
}

/// Opens sessions for endpoints
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &Endpoint) -> PrintResult<Box<dyn PrinterSession>>;
}

/// Connector backed by the real devices
#[derive(Debug, Clone, Default)]
pub struct DeviceConnector;

#[async_trait]
impl Connector for DeviceConnector {
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn open(&self, endpoint: &Endpoint) -> PrintResult<Box<dyn PrinterSession>> {
        match endpoint {
            Endpoint::Network { host, port } => {
                Ok(Box::new(NetworkSession::connect(host, *port).await?))
            }
            Endpoint::Usb { device } => Ok(Box::new(UsbSession::open(device).await?)),
            Endpoint::Serial { port, baud_rate } => {
                Ok(Box::new(SerialSession::open(port, *baud_rate)?))
            }
        }
    }
}

// ============================================================================
// Network
// ============================================================================

/// Raw TCP session (JetDirect / port 9100)
pub struct NetworkSession {
    target: String,
    stream: TcpStream,
}

impl NetworkSession {
    pub async fn connect(host: &str, port: u16) -> PrintResult<Self> {
        if host.trim().is_empty() {
            return Err(PrintError::InvalidConfig("empty host".to_string()));
        }
        let target = format!("{}:{}", host, port);
        info!(target = %target, "Connecting to printer");
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| PrintError::Connection(format!("{}: {}", target, e)))?;
        // Small ESC/POS packets otherwise sit in Nagle's buffer
        stream.set_nodelay(true)?;
        Ok(Self { target, stream })
    }
}

#[async_trait]
impl PrinterSession for NetworkSession {
    async fn send(&mut self, data: &[u8]) -> PrintResult<()> {
        debug!(target = %self.target, bytes = data.len(), "sending");
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn probe(&mut self) -> PrintResult<()> {
        self.stream
            .peer_addr()
            .map(|_| ())
            .map_err(|e| PrintError::Offline(format!("{}: {}", self.target, e)))
    }

    async fn close(&mut self) -> PrintResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.target)
    }
}

// ============================================================================
// USB
// ============================================================================

/// USB printer-class device node
pub struct UsbSession {
    device: String,
    file: tokio::fs::File,
}

impl UsbSession {
    pub async fn open(device: &str) -> PrintResult<Self> {
        if device.trim().is_empty() {
            return Err(PrintError::InvalidConfig("empty USB device".to_string()));
        }
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(device)
            .await
            .map_err(|e| PrintError::Connection(format!("{}: {}", device, e)))?;
        info!(device = %device, "Opened USB printer");
        Ok(Self {
            device: device.to_string(),
            file,
        })
    }
}

#[async_trait]
impl PrinterSession for UsbSession {
    async fn send(&mut self, data: &[u8]) -> PrintResult<()> {
        debug!(device = %self.device, bytes = data.len(), "sending");
        self.file.write_all(data).await?;
        self.file.flush().await?;
        Ok(())
    }

    async fn probe(&mut self) -> PrintResult<()> {
        self.file
            .metadata()
            .await
            .map(|_| ())
            .map_err(|e| PrintError::Offline(format!("{}: {}", self.device, e)))
    }

    async fn close(&mut self) -> PrintResult<()> {
        self.file.flush().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("usb://{}", self.device)
    }
}

// ============================================================================
// Serial
// ============================================================================

/// Serial port session
pub struct SerialSession {
    path: String,
    port: serial2_tokio::SerialPort,
}

impl SerialSession {
    pub fn open(path: &str, baud_rate: u32) -> PrintResult<Self> {
        if path.trim().is_empty() {
            return Err(PrintError::InvalidConfig("empty serial port".to_string()));
        }
        let port = serial2_tokio::SerialPort::open(path, baud_rate)
            .map_err(|e| PrintError::Connection(format!("{}: {}", path, e)))?;
        info!(port = %path, baud_rate, "Opened serial printer");
        Ok(Self {
            path: path.to_string(),
            port,
        })
    }

    /// Serial ports visible to the OS
    pub fn available_ports() -> Vec<String> {
        match serial2_tokio::SerialPort::available_ports() {
            Ok(paths) => paths.iter().map(|p| p.display().to_string()).collect(),
            Err(_) => vec![],
        }
    }
}

#[async_trait]
impl PrinterSession for SerialSession {
    async fn send(&mut self, data: &[u8]) -> PrintResult<()> {
        debug!(port = %self.path, bytes = data.len(), "sending");
        let mut written = 0;
        while written < data.len() {
            let n = self.port.write(&data[written..]).await?;
            if n == 0 {
                return Err(PrintError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    format!("{}: port accepted no data", self.path),
                )));
            }
            written += n;
        }
        Ok(())
    }

    async fn probe(&mut self) -> PrintResult<()> {
        // An opened port is as far as RS-232 lets us see without a reply
        Ok(())
    }

    async fn close(&mut self) -> PrintResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        format!("serial://{}", self.path)
    }
}
