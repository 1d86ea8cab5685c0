//! Runtime settings and store construction

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use thiserror::Error;

use crate::store::{
    CacheStore, FileStore, MemoryStore, RedisStore, StoreError, DEFAULT_OPERATION_TIMEOUT,
};
use crate::upstream::{UpstreamClient, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};

/// Errors raised while turning settings into live components
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The redis store needs --redis-url or REDIS_URL")]
    MissingRedisUrl,

    #[error("Could not determine a cache directory; pass --cache-dir")]
    NoCacheDir,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which cache store backs the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StoreKind {
    /// Process-local map; nothing survives the process
    Memory,
    /// JSON files in the user cache directory
    #[default]
    File,
    /// Shared Redis instance
    Redis,
}

/// Everything needed to build a store and an upstream client
#[derive(Debug, Clone)]
pub struct Settings {
    pub store: StoreKind,
    pub redis_url: Option<String>,
    pub cache_dir: Option<PathBuf>,
    /// Bound on each store command
    pub store_timeout: Duration,
    /// Bound on each upstream call
    pub upstream_timeout: Duration,
    pub user_agent: String,
    /// Extra headers sent upstream, e.g. API keys
    pub headers: Vec<(String, String)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            redis_url: None,
            cache_dir: None,
            store_timeout: DEFAULT_OPERATION_TIMEOUT,
            upstream_timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
        }
    }
}

impl Settings {
    /// Opens the configured store
    pub async fn open_store(&self) -> Result<Arc<dyn CacheStore>, ConfigError> {
        let store: Arc<dyn CacheStore> = match self.store {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::File => match &self.cache_dir {
                Some(dir) => Arc::new(FileStore::with_dir(dir.clone())),
                None => Arc::new(FileStore::new().ok_or(ConfigError::NoCacheDir)?),
            },
            StoreKind::Redis => {
                let url = self.redis_url.as_deref().ok_or(ConfigError::MissingRedisUrl)?;
                let store = RedisStore::connect(url)
                    .await?
                    .with_operation_timeout(self.store_timeout);
                Arc::new(store)
            }
        };
        tracing::debug!(store = store.name(), "opened cache store");
        Ok(store)
    }

    /// Builds the upstream HTTP client
    pub fn upstream_client(&self) -> UpstreamClient {
        self.headers
            .iter()
            .fold(
                UpstreamClient::builder()
                    .timeout(self.upstream_timeout)
                    .user_agent(&self.user_agent),
                |builder, (name, value)| builder.header(name, value),
            )
            .build()
    }
}
