//! In-process response store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::responses::CacheEntry;
use super::store::ResponseStore;
use crate::Error;

/// Response store backed by a `HashMap`.
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> Result<(), Error> {
        self.entries.write().await.insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn len(&self) -> Result<u64, Error> {
        Ok(self.entries.read().await.len() as u64)
    }

    async fn clear(&self) -> Result<u64, Error> {
        let mut entries = self.entries.write().await;
        let count = entries.len() as u64;
        entries.clear();
        Ok(count)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
