// API module exposing the pipeline engine to callers
// Author: Gabriel Demetrios Lafis

mod models;
mod service;

pub use models::*;
pub use service::*;

use thiserror::Error;

use crate::pipeline::ValidationResult;
use crate::processing::ProcessingError;
use crate::storage::StorageError;

/// Represents an error in the API module
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {}", summarize(.0))]
    Validation(ValidationResult),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Internal error: {0}")]
    Internal(String),
}

fn summarize(result: &ValidationResult) -> String {
    result
        .errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
