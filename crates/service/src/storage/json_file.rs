use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use super::{DocumentStorage, Loaded};
use crate::errors::StorageError;

/// JSON document persisted in a single file.
///
/// Writes go to a uniquely named sibling temp file which is fsynced and then
/// renamed over the target, so a crash or a failed write never leaves a
/// truncated document behind.
#[derive(Clone, Debug)]
pub struct JsonFileStorage {
    file_path: PathBuf,
}

impl JsonFileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { file_path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        self.file_path
            .with_file_name(format!("{}.{}.tmp", name, Uuid::new_v4().simple()))
    }

    fn write_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Write { path: self.location(), source }
    }
}

#[async_trait]
impl DocumentStorage for JsonFileStorage {
    async fn load(&self) -> Result<Loaded, StorageError> {
        let bytes = match fs::read(&self.file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Loaded::Missing),
            Err(source) => return Err(StorageError::Read { path: self.location(), source }),
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => Ok(Loaded::Parsed(value)),
            Err(e) => Ok(Loaded::Corrupt { reason: e.to_string() }),
        }
    }

    async fn write_atomic(&self, doc: &Value) -> Result<(), StorageError> {
        let data = serde_json::to_vec_pretty(doc)?;
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| self.write_err(e))?;
            }
        }

        let tmp = self.tmp_path();
        let result = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &self.file_path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(self.write_err(e));
        }
        debug!(path = %self.file_path.display(), bytes = data.len(), "document replaced");
        Ok(())
    }

    fn location(&self) -> String {
        self.file_path.display().to_string()
    }
}
