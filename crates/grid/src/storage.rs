//! Persistence of per-grid request parameters between requests.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::GridResult;

/// Key/value store for a grid's last-used parameters.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Whether nothing is stored under `key`.
    async fn is_empty(&self, key: &str) -> GridResult<bool> {
        Ok(self.read(key).await?.is_none())
    }

    async fn read(&self, key: &str) -> GridResult<Option<String>>;

    async fn write(&self, key: &str, content: String) -> GridResult<()>;

    async fn clear(&self, key: &str) -> GridResult<()>;
}

/// Storage key for a grid's parameters.
pub fn storage_key(grid_name: &str) -> String {
    format!("grid:{grid_name}")
}

/// In-process storage, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, key: &str) -> GridResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    async fn write(&self, key: &str, content: String) -> GridResult<()> {
        self.entries.insert(key.to_string(), content);
        Ok(())
    }

    async fn clear(&self, key: &str) -> GridResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        let key = storage_key("users");
        assert_eq!(key, "grid:users");

        assert!(storage.is_empty(&key).await.unwrap());
        storage.write(&key, "{\"page\":\"2\"}".to_string()).await.unwrap();
        assert!(!storage.is_empty(&key).await.unwrap());
        assert_eq!(
            storage.read(&key).await.unwrap().as_deref(),
            Some("{\"page\":\"2\"}")
        );

        let shared = storage.clone();
        shared.clear(&key).await.unwrap();
        assert!(storage.is_empty(&key).await.unwrap());
    }
}
