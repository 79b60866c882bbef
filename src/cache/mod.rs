//! Distributed cache collaborator.
//!
//! The cache holds cached end-session request tokens under keys derived
//! from unguessable request identifiers, so no in-process locking is
//! needed around it. Implementations must provide atomic get/set/delete.

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

pub mod in_memory;

pub use in_memory::InMemoryCache;

/// Prefix of every cache key written by this crate.
pub const REQUEST_CACHE_KEY_PREFIX: &str = "end_session_request:";

/// Cache key of the request token stored for `request_id`.
pub fn request_cache_key(request_id: &str) -> String {
    format!("{REQUEST_CACHE_KEY_PREFIX}{request_id}")
}

/// Errors reported by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Key-value cache with per-entry time-to-live.
#[async_trait]
pub trait DistributedCache: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove an entry. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
