//! Command-line interface parsing for fetchcache
//!
//! Global flags choose the cache store and shape upstream requests; the `get`
//! and `batch` subcommands drive the bulk and per-item fetch paths.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::batch::BatchOptions;
use crate::config::{Settings, StoreKind};
use crate::key::{KeyBuilder, MAX_BATCH_ITEMS};
use crate::outcome::Ttl;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A `--header` value is not of the form `NAME:VALUE`
    #[error("Invalid header: '{0}'. Expected NAME:VALUE, e.g. x-api-key:abc123")]
    InvalidHeader(String),
}

/// fetchcache - Cache-aside fetches from rate-limited upstream APIs
#[derive(Parser, Debug)]
#[command(name = "fetchcache")]
#[command(about = "Fetch JSON from rate-limited upstream APIs through a shared cache")]
#[command(version)]
pub struct Cli {
    /// Cache store backend
    #[arg(long, value_enum, default_value_t = StoreKind::File)]
    pub store: StoreKind,

    /// Redis connection URL, used with --store redis
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Directory for --store file (defaults to the user cache directory)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Timeout for each upstream call, in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Timeout for each cache store command, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub store_timeout_ms: u64,

    /// User-Agent sent upstream
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Extra header sent upstream, repeatable
    ///
    /// Examples:
    ///   --header x-api-key:abc123
    ///   --header "Authorization: Bearer abc123"
    #[arg(long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one document for a whole identifier set, cached under one key
    Get(GetArgs),
    /// Fetch one document per identifier, each cached under its own key
    Batch(BatchArgs),
}

/// Flags shared by both subcommands
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Cache key namespace, e.g. market:crypto:v1
    #[arg(long)]
    pub namespace: String,

    /// Fold identifiers to lowercase before keying
    #[arg(long)]
    pub case_insensitive: bool,

    /// Lifetime of cached values, in seconds
    #[arg(long, default_value_t = 300)]
    pub ttl_secs: u64,

    /// Lifetime of cached not-found results, in seconds (defaults to --ttl-secs)
    #[arg(long)]
    pub negative_ttl_secs: Option<u64>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Upstream URL; `{ids}` is replaced by the comma-joined identifiers
    pub url: String,

    /// Identifiers to request
    pub ids: Vec<String>,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Pause between upstream calls, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub throttle_ms: u64,

    /// Maximum number of identifiers resolved per run
    #[arg(long, default_value_t = MAX_BATCH_ITEMS)]
    pub limit: usize,

    /// Upstream URL template; `{id}` is replaced by each identifier
    pub url: String,

    /// Identifiers to resolve
    pub ids: Vec<String>,
}

impl KeyArgs {
    pub fn builder(&self) -> KeyBuilder {
        let builder = KeyBuilder::new(&self.namespace);
        if self.case_insensitive {
            builder.case_insensitive()
        } else {
            builder
        }
    }

    pub fn ttl(&self) -> Ttl {
        let positive = Duration::from_secs(self.ttl_secs);
        let negative = self
            .negative_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(positive);
        Ttl::new(positive, negative)
    }
}

impl BatchArgs {
    pub fn options(&self) -> BatchOptions {
        BatchOptions::new(self.key.builder()).with_limit(self.limit)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// Parses a `NAME:VALUE` header argument
///
/// # Returns
/// * `Ok((name, value))` with surrounding whitespace trimmed
/// * `Err(CliError::InvalidHeader)` if there is no `:` or the name is empty
pub fn parse_header_arg(s: &str) -> Result<(String, String), CliError> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| CliError::InvalidHeader(s.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::InvalidHeader(s.to_string()));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl Settings {
    /// Creates Settings from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(Settings)` with appropriate settings
    /// * `Err(CliError)` if a header argument is malformed
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let headers = cli
            .headers
            .iter()
            .map(|h| parse_header_arg(h))
            .collect::<Result<Vec<_>, _>>()?;

        let defaults = Settings::default();
        Ok(Settings {
            store: cli.store,
            redis_url: cli.redis_url.clone(),
            cache_dir: cli.cache_dir.clone(),
            store_timeout: Duration::from_millis(cli.store_timeout_ms),
            upstream_timeout: Duration::from_secs(cli.timeout_secs),
            user_agent: cli.user_agent.clone().unwrap_or(defaults.user_agent),
            headers,
        })
    }
}
