//! Error types for ddb-io

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// Input missing, not a regular file, or unreadable
    #[error("Input file does not exist or is not readable: {}", .0.display())]
    InputNotReadable(PathBuf),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] ddb_common::Error),
}

pub type ConvertResult<T> = Result<T, ConvertError>;
