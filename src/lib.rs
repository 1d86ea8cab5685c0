//! fetchcache library
//!
//! Cache-aside orchestration for volatile data fetched from rate-limited
//! upstream HTTP APIs: canonical cache keys, a pluggable TTL store, a fetch
//! orchestrator that refuses to cache bad data, and a throttled batch
//! coordinator. Also exposes the CLI modules for use in integration tests.

pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod key;
pub mod logging;
pub mod orchestrator;
pub mod outcome;
pub mod store;
pub mod upstream;

pub use batch::{BatchOptions, BatchResult, DEFAULT_THROTTLE};
pub use key::{build_key, ItemSet, KeyBuilder, MAX_BATCH_ITEMS};
pub use orchestrator::{CacheAside, Fetched, Source};
pub use outcome::{classify_signal, Cached, FetchError, Outcome, Signal, Ttl};
pub use store::{CacheStore, FileStore, MemoryStore, RedisStore, StoreError};
pub use upstream::UpstreamClient;
