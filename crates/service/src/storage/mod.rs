//! Storage abstractions for service layer
//!
//! A single port, [`DocumentStorage`], hides where a JSON document lives.
//! Stores above it only ever load the whole document or replace it whole.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StorageError;

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

/// Result of reading the backing document.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// Nothing has been written yet.
    Missing,
    /// Bytes exist but are not valid JSON.
    Corrupt { reason: String },
    Parsed(Value),
}

impl Loaded {
    pub fn exists(&self) -> bool {
        !matches!(self, Loaded::Missing)
    }
}

#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Read and parse the document. Only I/O failures other than "not found" are errors.
    async fn load(&self) -> Result<Loaded, StorageError>;

    /// Replace the document as a whole. Readers observe either the old or the new content.
    async fn write_atomic(&self, doc: &Value) -> Result<(), StorageError>;

    /// Human readable location for logs.
    fn location(&self) -> String;
}
