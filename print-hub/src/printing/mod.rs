//! Print Pipeline
//!
//! Orders in, printer bytes out:
//! - decomposer: order → bill summary + one label meta per physical label
//! - queue: per-role FIFO lanes with bounded retry
//! - connection: per-operation printer sessions, one in flight per role
//! - storage: failed jobs, history, printer configs, printed labels

pub mod connection;
pub mod decomposer;
pub mod error;
pub mod events;
pub mod payload;
pub mod queue;
pub mod renderer;
pub mod storage;

pub use connection::{DEFAULT_CONNECT_TIMEOUT, PrinterConnectionManager};
pub use decomposer::{
    MAX_LABELS_PER_ORDER, decompose_bill, decompose_labels, label_tasks, total_labels,
};
pub use error::{ConnectionError, ConnectionResult, PrintJobError};
pub use events::{FailureAlert, QueueEvent};
pub use payload::encode_job;
pub use queue::{PrintQueue, QueueConfig};
pub use renderer::{HttpCaptureGateway, RenderError, RenderedImage, Renderer};
pub use storage::{PrintStorage, PrintStorageError, PrintStorageResult, PrintStorageStats};
