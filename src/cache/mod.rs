//! On-disk page cache
//!
//! Fetched pages are cached by request key (the resolved URL, plus the JSON
//! body for POST requests) so that re-running an export against the same
//! site does not hit the network again:
//! - [`PageCache`]: read-through / write-through cache interface
//! - [`DiskCache`]: one JSON file per entry, named by the SHA-256 of the key
//!
//! # Example
//!
//! ```rust,ignore
//! use kb_exporter::cache::{CachedPage, DiskCache, PageCache};
//!
//! let cache = DiskCache::new(".cache/pages")?;
//! cache.put("https://help.example.com/", &CachedPage::new(final_url, body)).await?;
//! let hit = cache.get("https://help.example.com/").await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::utils::error::FetchError;

/// A cached response: final URL after redirects and the decoded body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPage {
    /// URL the request ended on
    pub final_url: String,
    /// Decoded response body
    pub body: String,
    /// Timestamp when cached
    pub cached_at: i64,
}

impl CachedPage {
    pub fn new(final_url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            final_url: final_url.into(),
            body: body.into(),
            cached_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Durable key/value store for fetched pages; no TTL
#[async_trait]
pub trait PageCache: Send + Sync {
    /// Look up an entry, `None` on a miss
    async fn get(&self, key: &str) -> Result<Option<CachedPage>, FetchError>;

    /// Store an entry, replacing any previous one
    async fn put(&self, key: &str, page: &CachedPage) -> Result<(), FetchError>;

    /// Drop an entry if present
    async fn evict(&self, key: &str) -> Result<(), FetchError>;
}

/// Cache key digest
#[must_use]
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// File-per-entry cache below a directory
#[derive(Debug, Clone)]
pub struct DiskCache {
    directory: PathBuf,
}

impl DiskCache {
    /// Open (and create when missing) a cache directory
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Cache` if the directory cannot be created
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| {
            FetchError::Cache(format!(
                "Failed to create cache directory {}: {e}",
                directory.display()
            ))
        })?;

        tracing::debug!(directory = %directory.display(), "Opened page cache");
        Ok(Self { directory })
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", hash_key(key)))
    }
}

#[async_trait]
impl PageCache for DiskCache {
    async fn get(&self, key: &str) -> Result<Option<CachedPage>, FetchError> {
        let path = self.entry_path(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(key = %key, "Page cache miss");
                return Ok(None);
            }
            Err(e) => {
                return Err(FetchError::Cache(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        match serde_json::from_slice::<CachedPage>(&raw) {
            Ok(page) => {
                tracing::debug!(key = %key, "Page cache hit");
                Ok(Some(page))
            }
            Err(e) => {
                // corrupt entries are refetched
                tracing::warn!(key = %key, error = %e, "Ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, page: &CachedPage) -> Result<(), FetchError> {
        let path = self.entry_path(key);
        let raw = serde_json::to_vec(page)
            .map_err(|e| FetchError::Cache(format!("Failed to encode cache entry: {e}")))?;

        tokio::fs::write(&path, raw).await.map_err(|e| {
            FetchError::Cache(format!("Failed to write {}: {e}", path.display()))
        })
    }

    async fn evict(&self, key: &str) -> Result<(), FetchError> {
        let path = self.entry_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Evicted page cache entry");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FetchError::Cache(format!(
                "Failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}
