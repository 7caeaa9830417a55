//! Filer configuration
//!
//! Tuning knobs for the transfer engine. All values have sensible defaults;
//! the struct derives `Deserialize` so it can be embedded in a caller's own
//! TOML or JSON configuration.

use serde::Deserialize;

/// Default part size: 5 MiB, the S3 minimum for non-final multipart parts.
pub const DEFAULT_PART_SIZE: usize = 5 * 1024 * 1024;

/// Default unread-byte threshold before a read connection is abandoned
/// instead of drained: 128 KiB.
pub const DEFAULT_MAX_DRAIN_BYTES: u64 = 128 * 1024;

/// Configuration for a [`Filer`](crate::Filer) handle
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilerConfig {
    /// Bytes buffered in memory before a part is cut and uploaded
    pub part_size: usize,

    /// Unread bytes tolerated on read-stream close before the connection is
    /// abandoned rather than drained for reuse
    pub max_drain_bytes: u64,

    /// Server-side storage class label applied to put, copy and
    /// initiate-multipart calls
    pub storage_class: String,

    /// Maximum remote calls per second, shared across all operations of the
    /// handle
    pub request_rate: f64,

    /// Maximum upload bytes per second; `None` means unbounded
    pub byte_rate: Option<f64>,

    /// Parallel part-upload workers
    pub workers: usize,

    /// Queued part tasks tolerated before submission blocks; `None` defaults
    /// to the worker count
    pub max_queued: Option<usize>,

    /// Skip writing zero-byte directory placeholder objects
    pub bypass_dir_markers: bool,
}

impl Default for FilerConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            max_drain_bytes: DEFAULT_MAX_DRAIN_BYTES,
            storage_class: "STANDARD".to_string(),
            request_rate: 3400.0,
            byte_rate: None,
            workers: 8,
            max_queued: None,
            bypass_dir_markers: false,
        }
    }
}

impl FilerConfig {
    /// Effective task queue depth: configured value or the worker count.
    pub fn queue_depth(&self) -> usize {
        self.max_queued.unwrap_or(self.workers)
    }

    /// Validate values that would otherwise wedge the engine at runtime.
    pub fn validate(&self) -> crate::Result<()> {
        if self.part_size == 0 {
            return Err(crate::Error::Config("part_size must be > 0".to_string()));
        }
        if self.workers == 0 {
            return Err(crate::Error::Config("workers must be > 0".to_string()));
        }
        if self.request_rate <= 0.0 {
            return Err(crate::Error::Config(
                "request_rate must be positive".to_string(),
            ));
        }
        if let Some(rate) = self.byte_rate
            && rate <= 0.0
        {
            return Err(crate::Error::Config(
                "byte_rate must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
