//! Batch lookups over per-item cache entries
//!
//! A batch costs one multi-get against the store. Items that were not found
//! are then fetched one at a time, with a fixed pause between upstream calls
//! so a burst of misses stays under the provider's rate limit.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::key::{ItemSet, KeyBuilder, MAX_BATCH_ITEMS};
use crate::orchestrator::{decode, CacheAside};
use crate::outcome::{Cached, FetchError, Outcome, Ttl};

/// Default pause between consecutive upstream calls in a batch
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);

/// How requested identifiers are normalized and capped
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub builder: KeyBuilder,
    pub limit: usize,
}

impl BatchOptions {
    pub fn new(builder: KeyBuilder) -> Self {
        Self {
            builder,
            limit: MAX_BATCH_ITEMS,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Values resolved for a batch
///
/// Items without data (negative, failed or invalid) are absent from `results`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult<T> {
    pub results: BTreeMap<String, T>,
    /// Items considered after normalization and capping
    pub requested: usize,
    /// Items with a value
    pub fetched: usize,
}

impl<T> BatchResult<T> {
    fn new(results: BTreeMap<String, T>, requested: usize) -> Self {
        Self {
            fetched: results.len(),
            results,
            requested,
        }
    }
}

impl CacheAside {
    /// Resolves many items, each cached under its own key
    ///
    /// # Arguments
    /// * `items` - Requested identifiers, normalized and capped per `options`
    /// * `key_fn` - Maps a normalized identifier to its cache key
    /// * `ttl` - Lifetime of positive and negative entries
    /// * `producer` - Fetches one identifier from upstream
    /// * `throttle` - Pause after every upstream call except the last
    pub async fn resolve_batch<T, I, S, K, P, Fut>(
        &self,
        items: I,
        options: &BatchOptions,
        key_fn: K,
        ttl: impl Into<Ttl>,
        mut producer: P,
        throttle: Duration,
    ) -> BatchResult<T>
    where
        T: Serialize + DeserializeOwned,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        K: Fn(&str) -> String,
        P: FnMut(String) -> Fut,
        Fut: Future<Output = Result<Outcome<T>, FetchError>>,
    {
        let ttl = ttl.into();
        let items = ItemSet::new(items, &options.builder, options.limit);
        if items.is_empty() {
            return BatchResult::new(BTreeMap::new(), 0);
        }

        let keys: Vec<String> = items.iter().map(|item| key_fn(item)).collect();
        let cached = match self.store().mget(&keys).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    store = self.store().name(),
                    error = %e,
                    "batch cache read failed; fetching every item"
                );
                vec![None; keys.len()]
            }
        };

        let mut results = BTreeMap::new();
        let mut misses = Vec::new();
        let mut negative_hits = 0usize;
        for ((item, key), value) in items.iter().zip(&keys).zip(cached) {
            match value.and_then(|bytes| decode::<T>(key, &bytes)) {
                Some(Cached::Positive(value)) => {
                    results.insert(item.to_string(), value);
                }
                Some(Cached::Negative) => negative_hits += 1,
                None => misses.push((item, key)),
            }
        }

        let hits = results.len();
        for (i, (item, key)) in misses.iter().enumerate() {
            let value = self
                .get_or_compute(key, ttl, || producer(item.to_string()))
                .await;
            if let Some(value) = value {
                results.insert(item.to_string(), value);
            }
            if i + 1 < misses.len() {
                tokio::time::sleep(throttle).await;
            }
        }

        let result = BatchResult::new(results, items.len());
        tracing::info!(
            namespace = options.builder.namespace(),
            requested = result.requested,
            hits,
            negative_hits,
            misses = misses.len(),
            fetched = result.fetched,
            "resolved batch"
        );
        result
    }
}
