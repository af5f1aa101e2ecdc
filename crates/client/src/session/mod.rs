//! Policy-aware cache session.
//!
//! Every send resolves an effective TTL in this order: the per-call
//! override, the registry entry for the canonical URL, the registry entry
//! for the derived cache key, and finally the session default. A registry
//! change for the URL or the key invalidates the cached response once,
//! before the lookup.
//!
//! The per-call TTL is passed down explicitly and never written into the
//! session, so concurrent sends cannot observe each other's overrides and
//! `default_expiry` is the same before and after any call.

mod sweep;

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use reqwest::Method;
use tokio::sync::Mutex;
use urlttl_core::policy::is_expired;
use urlttl_core::{
    AppConfig, CacheDb, CacheEntry, CachedResponse, Error, ExpirationRegistry, ExpireAfter, MemoryStore, ResponseStore,
};

use crate::fetch::{FetchClient, FetchConfig, registry_key};
use crate::request::Request;
use crate::transport::Transport;

/// A response returned by the session, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct SessionResponse {
    pub response: CachedResponse,
    /// True when served from the store without touching the transport.
    pub from_cache: bool,
    /// Derived cache key the response is stored under.
    pub cache_key: String,
    /// Directive that was in effect for this call.
    pub expire_after: ExpireAfter,
}

/// Outcome of consulting the registry for one send.
struct Resolution {
    directive: ExpireAfter,
    invalidate: bool,
}

/// Response cache session with per-URL expiration policy.
pub struct PolicySession {
    store: Arc<dyn ResponseStore>,
    transport: Arc<dyn Transport>,
    registry: Mutex<ExpirationRegistry>,
    default_expiry: Option<TimeDelta>,
}

impl PolicySession {
    /// Create a session whose responses never expire unless a TTL is registered.
    pub fn new(store: Arc<dyn ResponseStore>, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport, registry: Mutex::new(ExpirationRegistry::new()), default_expiry: None }
    }

    /// Set the session default expiry (`None` = never expire).
    pub fn with_default_expiry(mut self, expiry: Option<TimeDelta>) -> Self {
        self.default_expiry = expiry;
        self
    }

    /// Start from an existing registry instead of an empty one.
    pub fn with_registry(mut self, registry: ExpirationRegistry) -> Self {
        self.registry = Mutex::new(registry);
        self
    }

    /// Build a session from application configuration: SQLite or in-memory
    /// store, a reqwest transport, and the configured default expiry.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let store: Arc<dyn ResponseStore> = if config.in_memory {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(CacheDb::open(&config.db_path).await?)
        };
        let transport = Arc::new(FetchClient::new(FetchConfig::from(config))?);
        let default_expiry = config
            .default_expiry()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        tracing::debug!(store = store.name(), default_expiry = ?default_expiry, "policy session ready");

        Ok(Self::new(store, transport).with_default_expiry(default_expiry))
    }

    pub fn default_expiry(&self) -> Option<TimeDelta> {
        self.default_expiry
    }

    pub fn set_default_expiry(&mut self, expiry: Option<TimeDelta>) {
        self.default_expiry = expiry;
    }

    pub fn store(&self) -> &Arc<dyn ResponseStore> {
        &self.store
    }

    /// Register a TTL for a URL or a derived cache key without making a request.
    ///
    /// Returns whether the directive changed; a change invalidates the cached
    /// response on the next matching request.
    pub async fn register_url(&self, key_or_url: &str, expire_after: ExpireAfter) -> Result<bool, Error> {
        let key = registry_key(key_or_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let changed = self.registry.lock().await.set(key.as_str(), expire_after);
        tracing::debug!(key = %key, expire_after = %expire_after, changed, "registered ttl");
        Ok(changed)
    }

    /// Directive registered for a URL or derived cache key, if any.
    pub async fn directive_for(&self, key_or_url: &str) -> Result<Option<ExpireAfter>, Error> {
        let key = registry_key(key_or_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(self.registry.lock().await.get(&key))
    }

    /// GET `url`, optionally overriding its TTL for this call.
    pub async fn get(&self, url: &str, expire_after: ExpireAfter) -> Result<SessionResponse, Error> {
        self.request(Method::GET, url, expire_after).await
    }

    /// Issue a request. A non-`Default` override is recorded against the
    /// request's cache key and governs this call.
    pub async fn request(&self, method: Method, url: &str, expire_after: ExpireAfter) -> Result<SessionResponse, Error> {
        let request = Request::new(method, url)?;
        self.send(&request, expire_after).await
    }

    /// Resolve the TTL for `request`, apply pending invalidation, then serve
    /// it from the store or the transport.
    pub async fn send(&self, request: &Request, expire_after: ExpireAfter) -> Result<SessionResponse, Error> {
        let key = request.cache_key();
        let url = request.url().as_str();

        let resolution = self.resolve(url, &key, expire_after).await;
        if resolution.invalidate {
            let removed = self.store.delete(&key).await?;
            tracing::debug!(url, key = %key, removed, "ttl changed; invalidated cached response");
        }

        let expiry = resolution.directive.resolve(self.default_expiry);
        let now = Utc::now();

        if let Some(entry) = self.store.get(&key).await? {
            if !is_expired(entry.created_at, now, expiry) {
                tracing::debug!(url, key = %key, expire_after = %resolution.directive, "cache hit");
                return Ok(SessionResponse {
                    response: entry.response,
                    from_cache: true,
                    cache_key: key,
                    expire_after: resolution.directive,
                });
            }
            self.store.delete(&key).await?;
            tracing::debug!(url, key = %key, created_at = %entry.created_at, "cached response expired");
        }

        let mut response = self.transport.execute(request).await?;
        response.method = request.method().to_string();
        response.url = url.to_string();
        let entry = CacheEntry::new(response);

        // A non-positive TTL would make the entry stale on arrival.
        if expiry.is_none_or(|ttl| ttl > TimeDelta::zero()) {
            self.store.set(&key, &entry).await?;
        }
        tracing::debug!(url, key = %key, expire_after = %resolution.directive, "cache miss");

        Ok(SessionResponse {
            response: entry.response,
            from_cache: false,
            cache_key: key,
            expire_after: resolution.directive,
        })
    }

    /// Delete every cached response. Registered TTLs are kept.
    pub async fn clear(&self) -> Result<u64, Error> {
        let removed = self.store.clear().await?;
        tracing::info!(removed, "cleared response cache");
        Ok(removed)
    }

    /// Record the override, pick the effective directive and consume any
    /// pending change marks, all under one registry lock.
    async fn resolve(&self, url: &str, key: &str, expire_after: ExpireAfter) -> Resolution {
        let mut registry = self.registry.lock().await;

        let directive = if expire_after.is_default() {
            registry
                .get(url)
                .or_else(|| registry.get(key))
                .unwrap_or_default()
        } else {
            registry.set(key, expire_after);
            expire_after
        };

        let invalidate = if registry.take_changed(url) {
            // Keep the key-space entry in step with the URL it was registered under.
            registry.set(key, directive);
            registry.clear_changed(key);
            true
        } else {
            registry.take_changed(key)
        };

        Resolution { directive, invalidate }
    }
}
