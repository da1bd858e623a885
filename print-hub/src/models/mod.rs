//! Data models shared by the print pipeline and the HTTP API

pub mod job;
pub mod order;
pub mod printer;

pub use job::*;
pub use order::{Order, OrderLine, OrderSource, normalize_order};
pub use printer::*;
