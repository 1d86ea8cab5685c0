//! Cache store adapters
//!
//! The orchestrator only needs three operations from a TTL key-value store:
//! single get, single set with a TTL, and a multi-get answered in one round
//! trip. Values are opaque bytes; the orchestrator owns their encoding.
//!
//! - [`MemoryStore`] keeps entries in-process and counts calls, for tests and
//!   single-instance use.
//! - [`FileStore`] persists one JSON file per key in the XDG cache directory.
//! - [`RedisStore`] talks to a shared Redis instance.

#[cfg(test)]
pub(crate) mod failing;
mod file;
mod memory;
mod redis;

pub use self::file::FileStore;
pub use self::memory::{MemoryStore, StoreStats};
pub use self::redis::{RedisStore, DEFAULT_OPERATION_TIMEOUT};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a cache store; the orchestrator treats all of them as a miss
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis command or connection failure
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store did not answer within its operation timeout
    #[error("Cache store operation timed out after {0:?}")]
    Timeout(Duration),

    /// A value could not be encoded for this store
    #[error("Failed to encode cache entry: {0}")]
    Encoding(String),
}

/// A TTL-capable key-value store shared by any number of callers
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name used in log fields
    fn name(&self) -> &'static str;

    /// Returns the value for `key`, or `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes the full value for `key`, expiring after `ttl`
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;

    /// Reads all `keys` in one round trip
    ///
    /// The result is positionally aligned with `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError>;
}
