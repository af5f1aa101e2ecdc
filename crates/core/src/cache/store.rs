//! Key-value response store abstraction.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::responses::CacheEntry;
use crate::Error;

/// Storage backend for cached responses, addressed by cache key.
///
/// Implementations only store and return entries; deciding whether an entry
/// is still fresh is the caller's job.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error>;

    async fn set(&self, key: &str, entry: &CacheEntry) -> Result<(), Error>;

    /// Remove the entry for `key`. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> Result<bool, Error>;

    /// Snapshot of every key currently stored.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    async fn len(&self) -> Result<u64, Error>;

    /// Remove every entry, returning how many were removed.
    async fn clear(&self) -> Result<u64, Error>;

    fn name(&self) -> &'static str;
}

#[async_trait]
impl ResponseStore for CacheDb {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        self.get_response(key).await
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> Result<(), Error> {
        self.upsert_response(key, entry).await
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        self.delete_response(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.response_keys().await
    }

    async fn len(&self) -> Result<u64, Error> {
        self.count_responses().await
    }

    async fn clear(&self) -> Result<u64, Error> {
        self.purge_responses().await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
