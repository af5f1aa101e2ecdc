//! Core types and shared functionality for urlttl.
//!
//! This crate provides:
//! - Expiration policy: TTL directives and the per-key registry
//! - Response stores (SQLite and in-memory)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod policy;

pub use cache::{CacheDb, CacheEntry, CachedResponse, MemoryStore, ResponseStore};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use policy::{ExpirationRegistry, ExpireAfter};
