//! # crab-printer
//!
//! Thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building for bill printers
//! - TSPL command building for label printers
//! - Code page transcoding (GBK, Latin-1, UTF-8)
//! - Rasterising captured images into printer dots
//! - Network (TCP 9100), USB and serial transports
//!
//! WHAT to print and WHEN (queues, retries, order decomposition) lives in
//! `print-hub`.
//!
//! ## Example
//!
//! ```ignore
//! use crab_printer::{Connector, DeviceConnector, Endpoint, MonoBitmap, tspl};
//!
//! let img = image::load_from_memory(&png)?;
//! let bitmap = MonoBitmap::from_image(&img, Some(320));
//! let job = tspl::label_job(40.0, 30.0, 2.0, &bitmap);
//!
//! let endpoint = Endpoint::Network { host: "192.168.1.50".into(), port: 9100 };
//! let mut session = DeviceConnector.open(&endpoint).await?;
//! session.send(&job).await?;
//! session.close().await?;
//! ```

mod encoding;
mod error;
mod escpos;
mod raster;
mod transport;
pub mod tspl;

// Re-exports
pub use encoding::TextEncoding;
pub use error::{PrintError, PrintResult};
pub use escpos::{EscPosBuilder, PaperSize, test_page};
pub use raster::MonoBitmap;
pub use transport::{
    Connector, DeviceConnector, Endpoint, NetworkSession, PrinterSession, SerialSession,
    UsbSession,
};
pub use tspl::TsplBuilder;
