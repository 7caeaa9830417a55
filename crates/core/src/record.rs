//! Directory records and path/key mapping
//!
//! A [`Record`] is a read-only snapshot of one listing or metadata result.
//! A missing object on lookup is a distinguished absent record, never an
//! error.

use jiff::Timestamp;

use crate::error::{Error, Result};

/// Read-only snapshot of an object or directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Logical path within the store
    pub path: String,
    /// Last-modified time, when the store reported one
    pub modified: Option<Timestamp>,
    /// Object size in bytes; zero for directories and absent records
    pub size: u64,
    /// True for directory entries
    pub is_dir: bool,
    /// False for the absent-record sentinel returned by stat on a missing key
    pub exists: bool,
}

impl Record {
    /// Record for an existing file.
    pub fn file(path: impl Into<String>, size: u64, modified: Option<Timestamp>) -> Self {
        Self {
            path: path.into(),
            modified,
            size,
            is_dir: false,
            exists: true,
        }
    }

    /// Record for a directory entry.
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            modified: None,
            size: 0,
            is_dir: true,
            exists: true,
        }
    }

    /// Sentinel for a metadata lookup that found nothing.
    pub fn absent(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            modified: None,
            size: 0,
            is_dir: false,
            exists: false,
        }
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Map a logical path to a store key by stripping the leading separator.
pub fn key_for_path(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Join a parent path and a child name into a logical path.
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        format!("/{name}")
    } else if parent.starts_with('/') {
        format!("{parent}/{name}")
    } else {
        format!("/{parent}/{name}")
    }
}

/// Parse a store address of the form `scheme://bucket[/ignored]`.
///
/// Returns the base URI (scheme + bucket) and the bucket name. Anything
/// after the bucket is discarded. Fails fast on unparseable addresses or a
/// missing bucket host.
pub fn parse_store_url(address: &str) -> Result<(url::Url, String)> {
    let parsed = url::Url::parse(address).map_err(|e| Error::InvalidUrl(format!("{address}: {e}")))?;
    let bucket = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::InvalidUrl(format!("{address}: missing bucket")))?
        .to_string();

    let base = format!("{}://{}", parsed.scheme(), bucket);
    let base = url::Url::parse(&base).map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))?;

    Ok((base, bucket))
}
