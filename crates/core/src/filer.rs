//! Filer: a file-system-like contract over a remote object store
//!
//! One [`Filer`] handle owns the rate limiters and the lazily-created worker
//! pool shared by every stream opened through it. The handle is immutable
//! apart from those shared singletons and outlives any single transfer.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use crate::config::FilerConfig;
use crate::error::Result;
use crate::limit::RateLimiter;
use crate::pool::LazyPool;
use crate::read::FilerReader;
use crate::record::{Record, join_path, key_for_path};
use crate::store::ObjectStore;
use crate::write::FilerWriter;

/// Handle to one remote store
pub struct Filer {
    store: Arc<dyn ObjectStore>,
    uri: Url,
    config: FilerConfig,
    request_limiter: Arc<RateLimiter>,
    byte_limiter: Arc<RateLimiter>,
    /// Worker pool, created on first multipart flip and released exactly
    /// once at handle close.
    pool: Arc<LazyPool>,
}

impl Filer {
    /// Create a handle over `store`, addressed by `uri`.
    ///
    /// Fails fast on invalid configuration; no remote call is made here.
    pub fn new(store: Arc<dyn ObjectStore>, uri: Url, config: FilerConfig) -> Result<Self> {
        config.validate()?;
        let request_limiter = Arc::new(RateLimiter::new(config.request_rate));
        let byte_limiter = Arc::new(match config.byte_rate {
            Some(rate) => RateLimiter::new(rate),
            None => RateLimiter::unbounded(),
        });
        let pool = Arc::new(LazyPool::new(config.workers, config.queue_depth()));
        Ok(Self {
            store,
            uri,
            config,
            request_limiter,
            byte_limiter,
            pool,
        })
    }

    /// Base address of the store.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// List entries directly under `path`.
    ///
    /// Follows continuation cursors until the store reports no more pages.
    /// Directory names are deduplicated across pages, and keys ending in the
    /// path separator are treated as placeholder markers, not files.
    pub async fn list(&self, path: &str) -> Result<Vec<Record>> {
        let prefix = if path.is_empty() || path == "/" {
            String::new()
        } else {
            format!("{}/", key_for_path(path))
        };

        let mut records = Vec::new();
        let mut names: HashSet<String> = HashSet::new();
        let mut continuation = None;

        loop {
            self.request_limiter.acquire().await;
            let page = self.store.list_page(&prefix, continuation).await?;

            for dir in &page.dirs {
                if let Some(rest) = dir.strip_prefix(prefix.as_str()) {
                    let name = rest.replace('/', "");
                    if !name.is_empty() && names.insert(name.clone()) {
                        records.push(Record::dir(join_path(path, &name)));
                    }
                }
            }

            for object in &page.objects {
                if object.key.ends_with('/') {
                    continue;
                }
                let name = object.key.rsplit('/').next().unwrap_or(&object.key);
                records.push(Record::file(
                    join_path(path, name),
                    object.size,
                    object.modified,
                ));
            }

            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        Ok(records)
    }

    /// Metadata for `path`; a missing object yields an absent record, not an
    /// error.
    pub async fn stat(&self, path: &str) -> Result<Record> {
        self.request_limiter.acquire().await;
        match self.store.head(key_for_path(path)).await? {
            Some(meta) => {
                let mut record = Record::file(path, meta.size, meta.modified);
                record.is_dir = path.ends_with('/');
                Ok(record)
            }
            None => Ok(Record::absent(path)),
        }
    }

    /// Open a streaming reader for `path`.
    pub async fn read(&self, path: &str) -> Result<FilerReader> {
        self.request_limiter.acquire().await;
        let object = self.store.get(key_for_path(path)).await?;
        Ok(FilerReader::new(object, self.config.max_drain_bytes))
    }

    /// Open a streaming writer for `path`.
    ///
    /// The shared worker pool is not created until the writer's first flip.
    pub fn write(&self, path: &str) -> FilerWriter {
        FilerWriter::new(
            self.store.clone(),
            self.pool.clone(),
            self.request_limiter.clone(),
            self.byte_limiter.clone(),
            key_for_path(path).to_string(),
            self.config.storage_class.clone(),
            self.config.part_size,
        )
    }

    /// Rename as copy-then-delete; the store has no native move.
    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let old_key = key_for_path(old_path);
        let new_key = key_for_path(new_path);
        self.request_limiter.acquire().await;
        self.store
            .copy(old_key, new_key, &self.config.storage_class)
            .await?;
        self.request_limiter.acquire().await;
        self.store.delete(old_key).await
    }

    /// Write a zero-byte directory placeholder, unless bypassed.
    pub async fn create_dirs(&self, path: &str) -> Result<()> {
        if self.config.bypass_dir_markers {
            return Ok(());
        }
        let marker = format!("{}/", key_for_path(path).trim_end_matches('/'));
        self.request_limiter.acquire().await;
        self.store
            .put(&marker, Bytes::new(), &self.config.storage_class)
            .await
    }

    /// Delete the object at `path`.
    pub async fn delete_file(&self, path: &str) -> Result<()> {
        self.request_limiter.acquire().await;
        self.store.delete(key_for_path(path)).await
    }

    /// Delete the directory placeholder at `path`.
    pub async fn delete_dir(&self, path: &str) -> Result<()> {
        self.delete_file(path).await
    }

    /// Release the shared worker pool. Safe to call more than once.
    pub fn close(&self) {
        if self.pool.release() {
            tracing::debug!(uri = %self.uri, "released filer worker pool");
        }
    }

    /// True while the worker pool exists (some write session has flipped
    /// and the handle has not been closed).
    pub fn pool_active(&self) -> bool {
        self.pool.is_initialized()
    }
}

impl std::fmt::Debug for Filer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filer")
            .field("uri", &self.uri.as_str())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
