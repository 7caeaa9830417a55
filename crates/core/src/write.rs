//! Streaming write sessions
//!
//! A [`FilerWriter`] accumulates written bytes in memory and cuts them into
//! fixed-size parts ("flips"). The first flip lazily initiates a multipart
//! session; each flip submits one part-upload task to the shared pool. On
//! close, a payload that never filled a part is stored with a single
//! whole-object put and no session is ever opened. Otherwise any remainder
//! is force-flipped (the last part may be smaller than the part size), the
//! part results are collected in submission order, and the session is
//! completed with parts in ascending part-number order. If a part task or
//! the completion call fails, the session is aborted at most once and the
//! original failure is what the caller sees.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::limit::RateLimiter;
use crate::pool::{LazyPool, TaskHandle};
use crate::store::{ObjectStore, PartTag};

/// Byte-limiter metering granularity for outgoing part data.
const METER_CHUNK: usize = 64 * 1024;

/// Streaming writer for one object
///
/// Owned exclusively by one caller; part numbers are assigned in strict
/// write order under that exclusive ownership.
pub struct FilerWriter {
    store: Arc<dyn ObjectStore>,
    pool: Arc<LazyPool>,
    request_limiter: Arc<RateLimiter>,
    byte_limiter: Arc<RateLimiter>,
    key: String,
    storage_class: String,
    part_size: usize,
    buffer: Vec<u8>,
    /// Session id; set at most once, before the first part is submitted.
    upload_id: Option<String>,
    /// Submitted-but-uncollected part tasks, in submission order.
    parts: Vec<TaskHandle<PartTag>>,
    next_part: i32,
    closed: bool,
}

impl FilerWriter {
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        pool: Arc<LazyPool>,
        request_limiter: Arc<RateLimiter>,
        byte_limiter: Arc<RateLimiter>,
        key: String,
        storage_class: String,
        part_size: usize,
    ) -> Self {
        Self {
            store,
            pool,
            request_limiter,
            byte_limiter,
            key,
            storage_class,
            part_size,
            buffer: Vec::new(),
            upload_id: None,
            parts: Vec::new(),
            next_part: 1,
            closed: false,
        }
    }

    /// Append bytes, cutting a part whenever the buffer reaches part size.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(crate::Error::Closed(self.key.clone()));
        }
        self.buffer.extend_from_slice(data);
        self.flip(self.part_size).await
    }

    /// Finalize the object.
    ///
    /// Idempotent: a second close is a no-op and never re-runs the
    /// finalize/abort logic.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let Some(upload_id) = self.upload_id.clone() else {
            // Payload never filled a part: one whole-object put, no session.
            let data = Bytes::from(std::mem::take(&mut self.buffer));
            tracing::debug!(key = %self.key, size = data.len(), "storing small object");
            for chunk in data.chunks(METER_CHUNK) {
                self.byte_limiter.acquire_many(chunk.len() as u64).await;
            }
            self.request_limiter.acquire().await;
            return self.store.put(&self.key, data, &self.storage_class).await;
        };

        if let Err(e) = self.finish_multipart(&upload_id).await {
            self.abort(&upload_id).await;
            return Err(e);
        }
        Ok(())
    }

    async fn finish_multipart(&mut self, upload_id: &str) -> Result<()> {
        // Flush any remainder; the last part may be below the part size.
        self.flip(1).await?;

        // Collection blocks until every submitted task has finished, even
        // past the first failure, so no task outlives the session.
        let mut tags = Vec::with_capacity(self.parts.len());
        let mut failure = None;
        for handle in self.parts.drain(..) {
            match handle.join().await {
                Ok(tag) => tags.push(tag),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        // Handles are joined in submission order, so tags already arrive
        // sorted; reassemble by part number to make the ordering explicit.
        tags.sort_by_key(|t| t.part_number);

        tracing::debug!(key = %self.key, parts = tags.len(), "completing multipart upload");
        self.request_limiter.acquire().await;
        self.store
            .complete_multipart(&self.key, upload_id, tags)
            .await
    }

    /// Best-effort abort; its own failure must not mask the original cause.
    async fn abort(&mut self, upload_id: &str) {
        self.request_limiter.acquire().await;
        if let Err(e) = self.store.abort_multipart(&self.key, upload_id).await {
            tracing::warn!(key = %self.key, upload_id, error = %e, "abort of multipart upload failed");
        }
    }

    /// Cut the buffer into a part once it holds at least `min_size` bytes.
    async fn flip(&mut self, min_size: usize) -> Result<()> {
        if self.buffer.len() < min_size.max(1) {
            return Ok(());
        }

        let upload_id = match self.upload_id.clone() {
            Some(id) => id,
            None => {
                self.request_limiter.acquire().await;
                let id = self
                    .store
                    .initiate_multipart(&self.key, &self.storage_class)
                    .await?;
                tracing::debug!(key = %self.key, upload_id = %id, "initiated multipart upload");
                self.upload_id = Some(id.clone());
                id
            }
        };

        let data = Bytes::from(std::mem::take(&mut self.buffer));
        let part_number = self.next_part;
        self.next_part += 1;

        let store = self.store.clone();
        let request_limiter = self.request_limiter.clone();
        let byte_limiter = self.byte_limiter.clone();
        let key = self.key.clone();

        let handle = self
            .pool
            .get()
            .submit(async move {
                // Meter the outgoing bytes in read-sized chunks so large
                // parts do not outrun the byte-rate schedule all at once.
                for chunk in data.chunks(METER_CHUNK) {
                    byte_limiter.acquire_many(chunk.len() as u64).await;
                }
                request_limiter.acquire().await;
                store.upload_part(&key, &upload_id, part_number, data).await
            })
            .await;
        self.parts.push(handle);

        Ok(())
    }
}

impl std::fmt::Debug for FilerWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilerWriter")
            .field("key", &self.key)
            .field("buffered", &self.buffer.len())
            .field("upload_id", &self.upload_id)
            .field("next_part", &self.next_part)
            .field("closed", &self.closed)
            .finish()
    }
}
