//! Process-wide cache of compressed resources
//!
//! Entries are keyed by the raw query string of the resource request and
//! live for the lifetime of the cache. There is no TTL, eviction, or size
//! bound: one entry accumulates per distinct query string ever served.
//!
//! The encoding of an entry is chosen by whichever request populates it.
//! Later requests for the same key receive the same bytes and the same
//! encoding tag regardless of their own `Accept-Encoding`.

use crate::compressor::Compressor;
use crate::encoding::ContentEncoding;
use bytes::Bytes;
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use webzip_core::{Error, Result};

/// Identifies a cached resource: the exact request query string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a key from a raw query string
    pub fn new(query: impl Into<String>) -> Self {
        Self(query.into())
    }

    /// Key for a request URI. A URI without a query maps to the empty key.
    pub fn from_uri(uri: &http::Uri) -> Self {
        Self::new(uri.query().unwrap_or_default())
    }

    /// The raw query string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

/// Compressed bytes plus the encoding that produced them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    bytes: Bytes,
    encoding: ContentEncoding,
}

impl CacheEntry {
    fn compress(raw: &[u8], encoding: ContentEncoding, level: u32) -> Result<Self> {
        let bytes = Compressor::compress(raw, encoding, level)?;
        Ok(Self { bytes, encoding })
    }

    /// Compressed payload
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Encoding used to produce [`CacheEntry::bytes`]
    pub fn encoding(&self) -> ContentEncoding {
        self.encoding
    }
}

/// Cache of compressed resources.
///
/// Construct one per process and share it through an `Arc`. Population is
/// insert-if-absent per key: when several requests miss on the same key at
/// once, exactly one of them fetches and compresses while the rest wait for
/// its result.
pub struct ResourceCache {
    entries: DashMap<CacheKey, Arc<OnceCell<CacheEntry>>>,
    level: u32,
}

impl ResourceCache {
    /// Create an empty cache compressing at `level`
    pub fn new(level: u32) -> Self {
        Self {
            entries: DashMap::new(),
            level,
        }
    }

    /// Return the entry for `key`, populating it on first use.
    ///
    /// On a miss `fetch` produces the uncompressed resource, which is
    /// compressed with `encoding` and stored. On a hit both `fetch` and
    /// `encoding` are ignored. A failed fetch or compression leaves the key
    /// unpopulated, releases its slot, and is returned to the caller.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        encoding: ContentEncoding,
        fetch: F,
    ) -> Result<CacheEntry>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        let cell = self.cell(key);

        if let Some(entry) = cell.get() {
            debug!(key = %key, encoding = %entry.encoding, "Resource cache hit");
            return Ok(entry.clone());
        }

        let level = self.level;
        let populated = cell
            .get_or_try_init(|| async move {
                let raw = fetch().await?;
                let entry = CacheEntry::compress(&raw, encoding, level)?;
                info!(
                    key = %key,
                    encoding = %encoding,
                    original_size = raw.len(),
                    compressed_size = entry.bytes.len(),
                    "Resource compressed and cached"
                );
                Ok::<_, Error>(entry)
            })
            .await;

        match populated {
            Ok(entry) => {
                // A waiter may populate a cell whose slot an earlier failure released
                if !self.entries.contains_key(key) {
                    self.entries
                        .entry(key.clone())
                        .or_insert_with(|| Arc::clone(&cell));
                }
                Ok(entry.clone())
            }
            Err(e) => {
                // Empty slots must not outlive a failure, or every failing
                // query string stays in the map
                self.entries.remove_if(key, |_, cell| !cell.initialized());
                debug!(key = %key, error = %e, "Resource fetch failed, slot released");
                Err(e)
            }
        }
    }

    /// Look up a populated entry without computing it
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries
            .get(key)
            .and_then(|cell| cell.value().get().cloned())
    }

    /// Number of populated entries
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|cell| cell.value().initialized())
            .count()
    }

    /// Check if no entry has been populated
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, key: &CacheKey) -> Arc<OnceCell<CacheEntry>> {
        if let Some(cell) = self.entries.get(key) {
            return Arc::clone(cell.value());
        }
        let cell = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()));
        Arc::clone(cell.value())
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(6)
    }
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("entries", &self.entries.len())
            .field("level", &self.level)
            .finish()
    }
}
