//! In-process store with passive expiry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{CacheStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: Arc<Vec<u8>>,
    /// `None` when the TTL reaches past what the clock can represent
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// Number of calls each operation has received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub gets: usize,
    pub sets: usize,
    pub mgets: usize,
}

/// A store backed by a concurrent map
///
/// Expiry uses the tokio clock, so tests running with a paused clock can
/// advance past a TTL without sleeping.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    mgets: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            gets: self.gets.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            mgets: self.mgets.load(Ordering::Relaxed),
        }
    }

    /// Whether a live entry exists for `key`, without counting as a read
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// Stores raw bytes without counting as a write, e.g. to seed a test
    pub fn insert_raw(&self, key: &str, value: impl Into<Vec<u8>>, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Arc::new(value.into()),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
    }

    fn read(&self, key: &str) -> Option<Vec<u8>> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired());
            return None;
        }
        Some(entry.value.as_ref().clone())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.read(key))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.insert_raw(key, value, ttl);
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        self.mgets.fetch_add(1, Ordering::Relaxed);
        Ok(keys.iter().map(|key| self.read(key)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_returns_none_for_missing_key() {
        let store = MemoryStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert_eq!(store.stats().gets, 1);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store
            .set("k", b"value", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert_eq!(store.stats().sets, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_passively() {
        let store = MemoryStore::new();
        store.set("k", b"v", Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.contains("k"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.contains("k"));
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_never_expires() {
        let store = MemoryStore::new();
        store
            .set("k", b"v", Duration::from_secs(u64::MAX))
            .await
            .unwrap();

        assert!(store.contains("k"));
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_mget_is_aligned_with_keys() {
        let store = MemoryStore::new();
        store.insert_raw("a", "1", Duration::from_secs(60));
        store.insert_raw("c", "3", Duration::from_secs(60));

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = store.mget(&keys).await.unwrap();

        assert_eq!(values, vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]);
        assert_eq!(store.stats().mgets, 1);
        assert_eq!(store.stats().gets, 0);
    }
}
