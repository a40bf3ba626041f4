use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{DocumentStorage, Loaded};
use crate::errors::StorageError;

/// In-memory stand-in for a document file.
///
/// Holds raw text so tests can plant corrupt documents, and can be told to
/// fail writes to simulate a full disk or a rename that never happens.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    raw: RwLock<Option<String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: &Value) -> Self {
        Self::with_raw(value.to_string())
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { raw: RwLock::new(Some(raw.into())), ..Self::default() }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn raw(&self) -> Option<String> {
        self.raw.read().await.clone()
    }

    pub async fn value(&self) -> Option<Value> {
        self.raw().await.and_then(|s| serde_json::from_str(&s).ok())
    }
}

#[async_trait]
impl DocumentStorage for MemoryStorage {
    async fn load(&self) -> Result<Loaded, StorageError> {
        let raw = self.raw.read().await;
        Ok(match raw.as_deref() {
            None => Loaded::Missing,
            Some(s) => match serde_json::from_str::<Value>(s) {
                Ok(v) => Loaded::Parsed(v),
                Err(e) => Loaded::Corrupt { reason: e.to_string() },
            },
        })
    }

    async fn write_atomic(&self, doc: &Value) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(doc)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                path: self.location(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            });
        }
        *self.raw.write().await = Some(text);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
