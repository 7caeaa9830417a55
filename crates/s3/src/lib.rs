//! filer-s3: aws-sdk-s3 adapter for the filer transfer engine
//!
//! Implements the `ObjectStore` trait from filer-core with straight
//! pass-through SDK calls, and provides a convenience constructor that wires
//! a client into a ready [`Filer`](filer_core::Filer) handle.

pub mod client;

pub use client::{S3Client, S3Options};

use std::sync::Arc;

use filer_core::{Filer, FilerConfig, Result};

/// Build a [`Filer`] handle over an S3 bucket.
///
/// The bucket is taken from the options' store address; malformed addresses
/// fail here, before any transfer begins.
pub async fn connect(options: S3Options, config: FilerConfig) -> Result<Filer> {
    let client = S3Client::new(options).await?;
    let uri = client.uri().clone();
    Filer::new(Arc::new(client), uri, config)
}
