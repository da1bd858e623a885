use crate::printing::{PrintStorageError, RenderError};
use thiserror::Error;

/// 服务启动/运行错误
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Storage error: {0}")]
    Storage(#[from] PrintStorageError),

    #[error("Renderer setup failed: {0}")]
    Renderer(#[from] RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
