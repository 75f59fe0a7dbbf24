use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Ошибки логгера. Ошибки записи всегда возвращаются вызывающему.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("configuration not initialized")]
    NotInitialized,

    #[error("invalid log prefix: {0:?}")]
    InvalidPrefix(String),

    #[error("failed to create log directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write log file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to rotate log file {}: {source}", .path.display())]
    Rotate { path: PathBuf, source: io::Error },

    #[error("invalid trace record: {0}")]
    Trace(#[from] serde_json::Error),
}
