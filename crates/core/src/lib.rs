//! filer-core: Core engine for the filer streaming S3 client
//!
//! This crate provides the store-independent transfer engine, including:
//! - Configuration for part sizing, rate limits and worker counts
//! - The ObjectStore trait consumed by the engine
//! - Rate limiters shared across all operations of one handle
//! - A bounded worker pool with ordered result collection
//! - Streaming write sessions (multipart upload coordination)
//! - Streaming read sessions (drain-or-abandon on close)
//!
//! This crate is designed to be independent of any specific S3 SDK,
//! allowing for easy testing and potential future support for other backends.

pub mod config;
pub mod error;
pub mod filer;
pub mod limit;
pub mod pool;
pub mod read;
pub mod record;
pub mod store;
pub mod write;

pub use config::FilerConfig;
pub use error::{Error, Result};
pub use filer::Filer;
pub use limit::RateLimiter;
pub use pool::{TaskHandle, TaskPool};
pub use read::FilerReader;
pub use record::{Record, key_for_path, parse_store_url};
pub use store::{GetObject, ListPage, ObjectBody, ObjectMeta, ObjectStore, PartTag};
pub use write::FilerWriter;
