//! Streaming read sessions
//!
//! A [`FilerReader`] wraps a fetched object's body with its declared length
//! and a running count of consumed bytes. On close it either drains the
//! unread remainder so the underlying connection can be reused, or abandons
//! the connection when the remainder exceeds the configured threshold.
//! Either path leaves the stream validly closed; the choice is a resource
//! trade-off, so close never raises.

use tokio::io::AsyncReadExt;

use crate::error::Result;
use crate::store::{GetObject, ObjectBody};

/// Streaming reader for one object
pub struct FilerReader {
    body: Option<ObjectBody>,
    length: u64,
    consumed: u64,
    max_drain_bytes: u64,
}

impl FilerReader {
    pub(crate) fn new(object: GetObject, max_drain_bytes: u64) -> Self {
        Self {
            body: Some(object.body),
            length: object.length,
            consumed: 0,
            max_drain_bytes,
        }
    }

    /// Read into `buf`, returning the number of bytes read (0 at EOF or
    /// after close).
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(body) = self.body.as_mut() else {
            return Ok(0);
        };
        let n = body.read(buf).await?;
        self.consumed += n as u64;
        Ok(n)
    }

    /// Read the entire remaining body.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if let Some(body) = self.body.as_mut() {
            let n = body.read_to_end(&mut out).await?;
            self.consumed += n as u64;
        }
        Ok(out)
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Declared total length of the object.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Close the stream, draining or abandoning the unread remainder.
    ///
    /// Idempotent, and never raises: a failed drain only costs connection
    /// reuse.
    pub async fn close(&mut self) {
        let Some(mut body) = self.body.take() else {
            return;
        };

        let unread = self.length.saturating_sub(self.consumed);
        if unread > self.max_drain_bytes {
            // Too much left over; abandoning the connection is cheaper than
            // discarding the remainder.
            tracing::debug!(unread, max = self.max_drain_bytes, "abandoning read connection");
            drop(body);
            return;
        }

        match tokio::io::copy(&mut body, &mut tokio::io::sink()).await {
            Ok(drained) => {
                tracing::debug!(drained, "drained read connection for reuse");
            }
            Err(e) => {
                tracing::debug!(error = %e, "drain failed; connection dropped");
            }
        }
    }
}

impl std::fmt::Debug for FilerReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilerReader")
            .field("length", &self.length)
            .field("consumed", &self.consumed)
            .field("max_drain_bytes", &self.max_drain_bytes)
            .field("closed", &self.body.is_none())
            .finish()
    }
}
