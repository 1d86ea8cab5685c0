//! Canonical cache keys for identifier sets
//!
//! Two requests naming the same identifiers in any order must land on the same
//! cache entry, so identifiers are normalized, deduplicated and sorted before
//! they are joined under a namespace prefix.

use std::collections::BTreeSet;

/// Maximum number of identifiers resolved in one logical request
pub const MAX_BATCH_ITEMS: usize = 10;

/// Separator between the namespace and the identifier list
const NAMESPACE_SEPARATOR: char = ':';

/// Separator between identifiers in a set key
const ID_SEPARATOR: char = ',';

/// Builds namespaced cache keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    namespace: String,
    case_insensitive: bool,
}

impl KeyBuilder {
    /// Creates a case-sensitive builder for the given namespace (e.g. "market:crypto:v1")
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            case_insensitive: false,
        }
    }

    /// Folds identifiers to lowercase before keying them
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Normalizes a single identifier
    ///
    /// Returns `None` for identifiers that are empty after trimming.
    pub fn normalize(&self, id: &str) -> Option<String> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return None;
        }
        if self.case_insensitive {
            Some(trimmed.to_lowercase())
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Builds the key for a whole identifier set
    pub fn build_key<I, S>(&self, ids: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let canonical: BTreeSet<String> = ids
            .into_iter()
            .filter_map(|id| self.normalize(id.as_ref()))
            .collect();

        let mut key = String::with_capacity(self.namespace.len() + 1);
        key.push_str(&self.namespace);
        key.push(NAMESPACE_SEPARATOR);
        for (i, id) in canonical.iter().enumerate() {
            if i > 0 {
                key.push(ID_SEPARATOR);
            }
            key.push_str(id);
        }
        key
    }

    /// Builds the key for a single, already normalized item
    pub fn item_key(&self, id: &str) -> String {
        format!("{}{}{}", self.namespace, NAMESPACE_SEPARATOR, id)
    }
}

/// Builds a case-sensitive set key under `namespace`
pub fn build_key<I, S>(namespace: &str, ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    KeyBuilder::new(namespace).build_key(ids)
}

/// A bounded, normalized and sorted set of identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSet {
    items: Vec<String>,
}

impl ItemSet {
    /// Normalizes, deduplicates and sorts `ids`, keeping at most `limit` of them
    pub fn new<I, S>(ids: I, builder: &KeyBuilder, limit: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = ids
            .into_iter()
            .filter_map(|id| builder.normalize(id.as_ref()))
            .collect();

        let total = unique.len();
        let items: Vec<String> = unique.into_iter().take(limit).collect();
        if total > items.len() {
            tracing::debug!(
                namespace = builder.namespace(),
                requested = total,
                limit,
                "dropping identifiers past batch limit"
            );
        }

        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }
}
