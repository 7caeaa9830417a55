//! ObjectStore trait consumed by the transfer engine
//!
//! The engine talks to the remote store only through this trait, so the
//! multipart coordination, draining and listing logic can be exercised
//! against simulated stores in tests. Implementations perform straight
//! pass-through calls; retry/backoff is a property of the underlying
//! transport, not of this boundary.

use async_trait::async_trait;
use bytes::Bytes;
use jiff::Timestamp;
use tokio::io::AsyncRead;

use crate::error::Result;

/// One page of a delimiter listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Aggregated next path segments (common prefixes), each ending in `/`
    pub dirs: Vec<String>,
    /// Full object keys under the prefix
    pub objects: Vec<ObjectMeta>,
    /// Continuation cursor for the next page, if the store reported one
    pub next: Option<String>,
}

/// Metadata for one stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub modified: Option<Timestamp>,
}

/// Opaque completion tag for one uploaded part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTag {
    /// Part number assigned at submission, dense from 1
    pub part_number: i32,
    /// Store-issued token required to finalize the transfer
    pub etag: String,
}

/// Streaming body of a fetched object.
pub type ObjectBody = std::pin::Pin<Box<dyn AsyncRead + Send>>;

/// A fetched object: its declared length and a streaming body.
///
/// Dropping the body without reading to the end abandons the underlying
/// transport connection; reading it to the end leaves the connection
/// reusable.
pub struct GetObject {
    pub length: u64,
    pub body: ObjectBody,
}

impl std::fmt::Debug for GetObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetObject")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Narrow interface over a remote object store
///
/// Keys are store-native (no leading separator). `head` reports a missing
/// key as `Ok(None)`, never as an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// One page of a prefix listing with `/` as the aggregation delimiter.
    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage>;

    /// Object metadata, or `None` when the key does not exist.
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>>;

    /// Fetch an object as a streaming body with its declared length.
    async fn get(&self, key: &str) -> Result<GetObject>;

    /// Whole-object put.
    async fn put(&self, key: &str, data: Bytes, storage_class: &str) -> Result<()>;

    /// Server-side copy.
    async fn copy(&self, src_key: &str, dst_key: &str, storage_class: &str) -> Result<()>;

    /// Delete one object.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Begin a multipart session, returning the store-assigned session id.
    async fn initiate_multipart(&self, key: &str, storage_class: &str) -> Result<String>;

    /// Upload one part within an open session.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<PartTag>;

    /// Finalize a session; `parts` are in ascending part-number order.
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<PartTag>,
    ) -> Result<()>;

    /// Abandon a session, discarding any uploaded parts.
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_head_absent() {
        let mut store = MockObjectStore::new();
        store
            .expect_head()
            .withf(|key| key == "missing")
            .returning(|_| Ok(None));

        let meta = store.head("missing").await.unwrap();
        assert!(meta.is_none());
    }

    #[test]
    fn test_get_object_debug_omits_body() {
        let obj = GetObject {
            length: 7,
            body: Box::pin(std::io::Cursor::new(b"abcdefg".to_vec())),
        };
        let s = format!("{obj:?}");
        assert!(s.contains("length: 7"));
    }
}
