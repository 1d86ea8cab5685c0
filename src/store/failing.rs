//! Store double whose operations can be made to fail, for exercising the
//! orchestrator's degraded paths

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{CacheStore, MemoryStore, StoreError};

/// Wraps a [`MemoryStore`]; each operation fails while its flag is set
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    pub(crate) inner: MemoryStore,
    pub(crate) fail_get: AtomicBool,
    pub(crate) fail_set: AtomicBool,
    pub(crate) fail_mget: AtomicBool,
    pub(crate) failures: AtomicUsize,
}

impl FailingStore {
    pub(crate) fn failing_reads() -> Self {
        let store = Self::default();
        store.fail_get.store(true, Ordering::SeqCst);
        store.fail_mget.store(true, Ordering::SeqCst);
        store
    }

    pub(crate) fn failing_writes() -> Self {
        let store = Self::default();
        store.fail_set.store(true, Ordering::SeqCst);
        store
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Timeout(Duration::from_millis(2000)));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check(&self.fail_get)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.check(&self.fail_set)?;
        self.inner.set(key, value, ttl).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        self.check(&self.fail_mget)?;
        self.inner.mget(keys).await
    }
}
