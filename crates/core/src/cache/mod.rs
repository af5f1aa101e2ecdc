//! Response cache storage.
//!
//! This module provides the key-value stores the policy session caches
//! responses in:
//!
//! - Request-derived SHA-256 cache keys
//! - A SQLite store with automatic schema migrations and WAL mode
//! - An in-memory store for tests and throwaway sessions

pub mod connection;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod responses;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::{compute_cache_key, is_cache_key};
pub use memory::MemoryStore;
pub use responses::{CacheEntry, CachedResponse};
pub use store::ResponseStore;
