//! Cache-aside fetch orchestration
//!
//! [`CacheAside`] answers from the store when it can and otherwise runs the
//! caller's producer, caching positive and negative outcomes with their TTLs.
//! Nothing here raises to the caller: store failures read as misses, producer
//! failures and invalid outcomes come back as "no value" and leave the store
//! untouched so the next request retries upstream.
//!
//! Concurrent misses for the same key share one producer invocation unless
//! single-flight is turned off with [`CacheAside::without_single_flight`].

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::outcome::{Cached, FetchError, Outcome, Ttl};
use crate::store::CacheStore;

/// Where a value handed back by the orchestrator came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Positive entry read from the store
    Hit,
    /// Negative entry read from the store
    NegativeHit,
    /// Producer returned a positive outcome
    Fetched,
    /// Producer returned a negative outcome
    FetchedNegative,
    /// Producer returned data that failed validation
    Invalid,
    /// Producer failed
    Failed,
    /// Another caller's in-flight fetch for the same key answered this one
    Coalesced,
}

/// A value together with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: Option<T>,
    pub source: Source,
}

/// The result of one producer run, as shared with coalesced callers
#[derive(Debug, Clone)]
struct Flight {
    /// Encoded record, if the outcome was cacheable
    record: Option<Vec<u8>>,
    source: Source,
}

impl Flight {
    fn empty(source: Source) -> Self {
        Self {
            record: None,
            source,
        }
    }
}

type InFlight = DashMap<String, Arc<OnceCell<Flight>>>;

/// Removes a key's in-flight slot when the caller that joined it is done
struct FlightGuard<'a> {
    in_flight: &'a InFlight,
    key: &'a str,
    cell: Arc<OnceCell<Flight>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // The map and this guard hold two references. An unfinished slot with
        // more holders stays: a waiting caller takes over the fetch.
        self.in_flight.remove_if(self.key, |_, cell| {
            Arc::ptr_eq(cell, &self.cell)
                && (cell.initialized() || Arc::strong_count(cell) <= 2)
        });
    }
}

/// Cache-aside orchestrator over an injected store
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    in_flight: Option<Arc<InFlight>>,
}

impl CacheAside {
    /// Creates an orchestrator with single-flight de-duplication enabled
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            in_flight: Some(Arc::new(DashMap::new())),
        }
    }

    /// Lets concurrent misses for one key each call their own producer
    pub fn without_single_flight(mut self) -> Self {
        self.in_flight = None;
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Returns the cached value for `key`, or computes, validates and caches a fresh one
    ///
    /// Negative outcomes, invalid outcomes and producer failures all yield `None`.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl: impl Into<Ttl>,
        producer: F,
    ) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Outcome<T>, FetchError>>,
    {
        self.get_or_compute_report(key, ttl, producer).await.value
    }

    /// Like [`get_or_compute`](Self::get_or_compute), also reporting where the value came from
    pub async fn get_or_compute_report<T, F, Fut>(
        &self,
        key: &str,
        ttl: impl Into<Ttl>,
        producer: F,
    ) -> Fetched<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Outcome<T>, FetchError>>,
    {
        let ttl = ttl.into();

        if let Some(record) = self.read_cached::<T>(key).await {
            return hit(record);
        }

        let Some(in_flight) = self.in_flight.as_deref() else {
            let (flight, record) = self.compute(key, ttl, producer).await;
            return Fetched {
                value: record.and_then(Cached::into_value),
                source: flight.source,
            };
        };

        let guard = FlightGuard {
            in_flight,
            key,
            cell: in_flight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone(),
        };

        let mut led: Option<Option<Cached<T>>> = None;
        let led_slot = &mut led;
        let flight = guard
            .cell
            .get_or_init(|| async move {
                let (flight, record) = self.compute(key, ttl, producer).await;
                *led_slot = Some(record);
                flight
            })
            .await;

        match led {
            Some(record) => Fetched {
                value: record.and_then(Cached::into_value),
                source: flight.source,
            },
            None => {
                tracing::debug!(key, "joined in-flight fetch");
                let value = flight
                    .record
                    .as_deref()
                    .and_then(|bytes| decode::<T>(key, bytes))
                    .and_then(Cached::into_value);
                Fetched {
                    value,
                    source: Source::Coalesced,
                }
            }
        }
    }

    /// Reads and decodes `key`; store errors and undecodable entries are misses
    pub(crate) async fn read_cached<T: DeserializeOwned>(&self, key: &str) -> Option<Cached<T>> {
        match self.store.get(key).await {
            Ok(Some(bytes)) => decode(key, &bytes),
            Ok(None) => {
                tracing::debug!(key, store = self.store.name(), "cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(key, store = self.store.name(), error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Runs the producer once and writes cacheable outcomes back
    async fn compute<T, F, Fut>(&self, key: &str, ttl: Ttl, producer: F) -> (Flight, Option<Cached<T>>)
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Outcome<T>, FetchError>>,
    {
        let (record, source) = match producer().await {
            Ok(Outcome::Positive(value)) => (Cached::Positive(value), Source::Fetched),
            Ok(Outcome::Negative) => (Cached::Negative, Source::FetchedNegative),
            Ok(Outcome::Invalid) => {
                tracing::warn!(key, "upstream returned unusable data; not caching");
                return (Flight::empty(Source::Invalid), None);
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "upstream fetch failed; not caching");
                return (Flight::empty(Source::Failed), None);
            }
        };

        let bytes = match serde_json::to_vec(&record) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to encode cache entry; treating as failed fetch");
                return (Flight::empty(Source::Failed), None);
            }
        };

        let expiry = ttl.for_record(&record);
        match self.store.set(key, &bytes, expiry).await {
            Ok(()) => {
                tracing::debug!(key, store = self.store.name(), ttl_secs = expiry.as_secs(), "cached fresh entry")
            }
            Err(e) => {
                tracing::warn!(key, store = self.store.name(), error = %e, "cache write failed")
            }
        }

        let flight = Flight {
            record: Some(bytes),
            source,
        };
        (flight, Some(record))
    }
}

fn hit<T>(record: Cached<T>) -> Fetched<T> {
    match record {
        Cached::Positive(value) => Fetched {
            value: Some(value),
            source: Source::Hit,
        },
        Cached::Negative => Fetched {
            value: None,
            source: Source::NegativeHit,
        },
    }
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Option<Cached<T>> {
    match serde_json::from_slice(bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(key, error = %e, "malformed cache entry; treating as miss");
            None
        }
    }
}
