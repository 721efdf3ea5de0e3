// Native file-based storage implementation

use crate::error::CoreError;
use crate::storage_trait::{StorageBackend, StorageResult};
use async_trait::async_trait;
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;

/// File-based storage backend for the daemon.
///
/// Each key maps to `<base_dir>/<key>.json`. Writes go through a temp file
/// and a rename, so a crash mid-write leaves the previous document intact.
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn get_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", key))
    }

    fn get_tmp_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json.tmp", key))
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn save<T: Serialize + Sync>(&self, key: &str, data: &T) -> StorageResult<()> {
        let path = self.get_path(key);
        let tmp_path = self.get_tmp_path(key);
        debug!("Saving data to file: {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::Io(format!("Failed to create directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(data).map_err(CoreError::Json)?;

        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| CoreError::Io(format!("Failed to write file: {}", e)))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| CoreError::Io(format!("Failed to replace file: {}", e)))?;

        Ok(())
    }

    async fn load<T: DeserializeOwned + Send>(&self, key: &str) -> StorageResult<Option<T>> {
        let path = self.get_path(key);
        debug!("Loading data from file: {:?}", path);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CoreError::Io(format!("Failed to read file: {}", e)))?;

        let data = serde_json::from_str(&json).map_err(CoreError::Json)?;

        Ok(Some(data))
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.get_path(key);
        debug!("Removing file: {:?}", path);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| CoreError::Io(format!("Failed to remove file: {}", e)))?;
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.get_path(key);
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }
}
