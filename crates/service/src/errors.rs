use std::io;

use thiserror::Error;

/// Failures of the durable storage port.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("write {path}: {source}")]
    Write { path: String, source: io::Error },
    #[error("encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("corrupt document at {0}")]
    Corrupt(String),
    #[error("catalog error: {0}")]
    Catalog(String),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self { Self::NotFound(format!("{} not found", entity)) }
}
