//! File-backed store for single-host use
//!
//! Each key is written as a JSON file with expiry timestamps under an
//! XDG-compliant cache directory. Expired or unreadable files read as absent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use super::{CacheStore, StoreError};

/// Longest encoded key used verbatim as a file stem; filesystems cap names at 255 bytes
const MAX_STEM_LEN: usize = 200;

/// Encoded bytes kept in front of the digest when a stem is shortened
const HASHED_PREFIX_LEN: usize = 64;

/// Wrapper struct for an entry stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    /// The cached payload (the orchestrator always writes JSON)
    data: String,
    /// When the entry was written
    cached_at: DateTime<Utc>,
    /// When the entry stops being served
    expires_at: DateTime<Utc>,
}

/// Stores cache entries as files on disk
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl FileStore {
    /// Creates a store in the XDG cache directory (`~/.cache/fetchcache/` on Linux)
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "fetchcache")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates a store rooted at a specific directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path of the file holding `key`
    ///
    /// Keys contain separators such as `:` and `,`; every byte outside
    /// `[A-Za-z0-9._-]` is percent-encoded so distinct keys never share a file.
    /// Stems longer than [`MAX_STEM_LEN`] keep a readable prefix and end in
    /// the SHA-256 of the whole key.
    fn cache_path(&self, key: &str) -> PathBuf {
        let mut name = encode_stem(key);
        if name.len() > MAX_STEM_LEN {
            let digest = Sha256::digest(key.as_bytes());
            name.truncate(HASHED_PREFIX_LEN);
            name.push('~');
            name.push_str(&hex::encode(digest));
        }
        name.push_str(".json");
        self.cache_dir.join(name)
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let content = match fs::read_to_string(self.cache_path(key)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: FileEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(key, error = %e, "ignoring unreadable cache file");
                return Ok(None);
            }
        };

        if Utc::now() >= entry.expires_at {
            return Ok(None);
        }
        Ok(Some(entry.data.into_bytes()))
    }
}

fn encode_stem(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 5);
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                name.push(byte as char)
            }
            _ => name.push_str(&format!("%{:02X}", byte)),
        }
    }
    name
}

#[async_trait]
impl CacheStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.read(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let data = String::from_utf8(value.to_vec())
            .map_err(|e| StoreError::Encoding(e.to_string()))?;
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Encoding(e.to_string()))?;

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| StoreError::Encoding(format!("expiry out of range for TTL {}", ttl)))?;
        let entry = FileEntry {
            data,
            cached_at: now,
            expires_at,
        };
        let json =
            serde_json::to_string(&entry).map_err(|e| StoreError::Encoding(e.to_string()))?;

        fs::create_dir_all(&self.cache_dir).await?;
        fs::write(self.cache_path(key), json).await?;
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.read(key).await?);
        }
        Ok(values)
    }
}
