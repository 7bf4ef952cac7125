//! Object store abstraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Information about a stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    /// Last modified timestamp (milliseconds since epoch)
    pub last_modified: Option<u64>,
}

/// Durable storage addressed by opaque keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Objects whose key starts with `prefix`.
    async fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    /// Delete the given keys, returning how many were removed.
    async fn delete_keys(&self, keys: &[String]) -> StorageResult<u32>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Temporary download URL.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Temporary upload URL.
    async fn presign_put(&self, key: &str, content_type: &str, expires_in: Duration) -> StorageResult<String>;

    async fn check_connectivity(&self) -> StorageResult<()>;

    /// Delete every object under `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> StorageResult<u32> {
        validate_prefix(prefix)?;
        let keys: Vec<String> = self
            .list_prefix(prefix)
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect();
        self.delete_keys(&keys).await
    }
}

/// Refuse prefixes that would match more than one project's objects.
pub fn validate_prefix(prefix: &str) -> StorageResult<()> {
    if prefix.trim().is_empty() || !prefix.ends_with('/') || prefix.contains("..") {
        return Err(StorageError::InvalidKey(format!(
            "refusing to delete by prefix '{}'",
            prefix
        )));
    }
    Ok(())
}
