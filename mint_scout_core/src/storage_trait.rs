// Storage abstraction over JSON documents keyed by name

use crate::error::CoreError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, CoreError>;

/// Abstract storage backend trait
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Save data with a key
    async fn save<T: Serialize + Sync>(&self, key: &str, data: &T) -> StorageResult<()>;

    /// Load data by key, None if the key has never been written
    async fn load<T: DeserializeOwned + Send>(&self, key: &str) -> StorageResult<Option<T>>;

    /// Remove data by key
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Standard storage keys used across the application
pub mod keys {
    pub const DETECTED_TOKENS: &str = "detected_tokens";
    pub const SNIPED_TOKENS: &str = "sniped_tokens";
}
