//! Error types for the filer engine
//!
//! Every transport-level failure is collapsed into a single uniform kind
//! (`Error::Network`) before it leaves this crate; a missing object on a
//! metadata lookup is never an error (see `Record::absent`).

use thiserror::Error;

/// Result type alias used throughout the filer crates
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the filer engine and its store adapters
#[derive(Debug, Error)]
pub enum Error {
    /// Lower-level client/service failure during a remote request
    #[error("network error: {0}")]
    Network(String),

    /// Requested object or bucket does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed store address, detected at construction
    #[error("invalid store URL: {0}")]
    InvalidUrl(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker task panicked or was cancelled before producing a result
    #[error("task failed: {0}")]
    TaskJoin(String),

    /// A stream was used after it was closed
    #[error("stream closed: {0}")]
    Closed(String),
}

impl Error {
    /// True when the error denotes a missing object rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
