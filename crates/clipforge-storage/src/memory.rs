//! In-memory object store.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageResult;
use crate::store::{ObjectInfo, ObjectStore};

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: impl Into<String>, data: Vec<u8>) {
        self.objects.write().await.insert(key.into(), data);
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| ObjectInfo {
                key: k.clone(),
                size: v.len() as u64,
                last_modified: None,
            })
            .collect())
    }

    async fn delete_keys(&self, keys: &[String]) -> StorageResult<u32> {
        let mut objects = self.objects.write().await;
        Ok(keys.iter().filter(|k| objects.remove(*k).is_some()).count() as u32)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!("memory://{}?expires={}", key, expires_in.as_secs()))
    }

    async fn presign_put(&self, key: &str, _content_type: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!("memory://{}?upload=1&expires={}", key, expires_in.as_secs()))
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_prefix_only_touches_prefix() {
        let store = MemoryObjectStore::new();
        store.put("users/u1/projects/p1/source.mp4", vec![1, 2, 3]).await;
        store.put("users/u1/projects/p1/clips/a.mp4", vec![4]).await;
        store.put("users/u1/projects/p10/source.mp4", vec![5]).await;

        let deleted = store.delete_prefix("users/u1/projects/p1/").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.exists("users/u1/projects/p10/source.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_prefix_rejects_broad_prefix() {
        let store = MemoryObjectStore::new();
        store.put("users/u1/a", vec![]).await;
        assert!(store.delete_prefix("").await.is_err());
        assert_eq!(store.len().await, 1);
    }
}
