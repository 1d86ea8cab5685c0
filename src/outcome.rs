//! Fetch outcomes and the records written to the cache

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a producer learned from one upstream call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Valid data; cached with the positive TTL
    Positive(T),
    /// Upstream confirmed the item does not exist; cached with the negative TTL
    Negative,
    /// Empty or implausible data; never cached so the next request retries
    Invalid,
}

impl<T> Outcome<T> {
    /// Wraps `value` as positive if it passes `check`, invalid otherwise
    pub fn validated(value: T, check: impl FnOnce(&T) -> bool) -> Self {
        if check(&value) {
            Outcome::Positive(value)
        } else {
            Outcome::Invalid
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Positive(value) => Outcome::Positive(f(value)),
            Outcome::Negative => Outcome::Negative,
            Outcome::Invalid => Outcome::Invalid,
        }
    }
}

/// A record as stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cached<T> {
    Positive(T),
    Negative,
}

impl<T> Cached<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            Cached::Positive(value) => Some(value),
            Cached::Negative => None,
        }
    }
}

/// Errors a producer may report; all of them are treated as a miss and never cached
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection or protocol failure
    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The call exceeded its time budget
    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    /// Any status other than success or not-found
    #[error("Upstream returned status {0}")]
    Status(u16),

    /// Body could not be parsed
    #[error("Failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Time-to-live for positive and negative entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ttl {
    pub positive: Duration,
    pub negative: Duration,
}

impl Ttl {
    pub fn new(positive: Duration, negative: Duration) -> Self {
        Self { positive, negative }
    }

    pub(crate) fn for_record<T>(&self, record: &Cached<T>) -> Duration {
        match record {
            Cached::Positive(_) => self.positive,
            Cached::Negative => self.negative,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Self::new(ttl, ttl)
    }
}

/// Items that carry one primary numeric reading (a price, a count, ...)
pub trait Signal {
    fn primary_signal(&self) -> f64;
}

/// Rejects empty result sets and sets where every primary reading is zero
///
/// A provider that is degraded often answers with well-formed records full of
/// zeroes. Producers for such providers opt into this check; a flat market is
/// indistinguishable from that failure under this rule, so it is not applied
/// by the orchestrator itself.
pub fn classify_signal<T: Signal>(items: Vec<T>) -> Outcome<Vec<T>> {
    if items.is_empty() || items.iter().all(|item| item.primary_signal() == 0.0) {
        Outcome::Invalid
    } else {
        Outcome::Positive(items)
    }
}
