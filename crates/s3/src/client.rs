//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from filer-core.
//! Every call is a straight pass-through; retry and timeout behavior is the
//! pre-configured property of the underlying SDK client.

use async_trait::async_trait;
use bytes::Bytes;
use jiff::Timestamp;
use url::Url;

use filer_core::{
    Error, GetObject, ListPage, ObjectMeta, ObjectStore, PartTag, Result, parse_store_url,
};

/// Connection options for an S3-backed filer
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    /// Store address, `s3://bucket`; anything after the bucket is ignored
    pub address: String,
    /// Custom endpoint for S3-compatible stores
    pub endpoint: Option<String>,
    /// AWS region
    pub region: Option<String>,
    /// Static access key / secret key; `None` uses the ambient provider
    /// chain (credential strategy selection is the SDK's concern)
    pub credentials: Option<(String, String)>,
    /// Path-style addressing for S3-compatible stores
    pub force_path_style: bool,
}

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    uri: Url,
    bucket: String,
}

impl S3Client {
    /// Create a new S3 client from connection options.
    ///
    /// Fails fast on a malformed store address, before any transfer begins.
    pub async fn new(options: S3Options) -> Result<Self> {
        let (uri, bucket) = parse_store_url(&options.address)?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some((access_key, secret_key)) = &options.credentials {
            let credentials = aws_credential_types::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None, // session token
                None, // expiry
                "filer-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }
        if let Some(region) = &options.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &options.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(options.force_path_style)
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            uri,
            bucket,
        })
    }

    /// Wrap an already-built SDK client addressed at `address`.
    pub fn from_client(client: aws_sdk_s3::Client, address: &str) -> Result<Self> {
        let (uri, bucket) = parse_store_url(address)?;
        Ok(Self {
            inner: client,
            uri,
            bucket,
        })
    }

    /// Base address of the store.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Format AWS SDK error into a detailed error message
    fn format_sdk_error<E: std::fmt::Display>(error: &aws_sdk_s3::error::SdkError<E>) -> String {
        match error {
            aws_sdk_s3::error::SdkError::ServiceError(service_err) => {
                let err = service_err.err();
                let meta = service_err.raw();
                let mut msg = format!("Service error: {}", err);
                if let Some(code) = meta.headers().get("x-amz-error-code")
                    && let Ok(code_str) = std::str::from_utf8(code.as_bytes())
                {
                    msg.push_str(&format!(" (code: {})", code_str));
                }
                msg
            }
            aws_sdk_s3::error::SdkError::ConstructionFailure(err) => {
                format!("Request construction failed: {:?}", err)
            }
            aws_sdk_s3::error::SdkError::TimeoutError(_) => "Request timeout".to_string(),
            aws_sdk_s3::error::SdkError::DispatchFailure(err) => {
                format!("Network dispatch error: {:?}", err)
            }
            aws_sdk_s3::error::SdkError::ResponseError(err) => {
                format!("Response error: {:?}", err)
            }
            _ => error.to_string(),
        }
    }

    /// Collapse an SDK error into the uniform transport failure kind.
    fn transport_error<E: std::fmt::Display>(error: &aws_sdk_s3::error::SdkError<E>) -> Error {
        Error::Network(Self::format_sdk_error(error))
    }

    fn is_missing(message: &str) -> bool {
        message.contains("NotFound") || message.contains("NoSuchKey")
    }

    fn storage_class(label: &str) -> aws_sdk_s3::types::StorageClass {
        aws_sdk_s3::types::StorageClass::from(label)
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage> {
        let mut request = self
            .inner
            .list_objects_v2()
            .bucket(&self.bucket)
            .delimiter("/");
        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }

        let response = request.send().await.map_err(|e| Self::transport_error(&e))?;

        let dirs = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(|s| s.to_string()))
            .collect();

        let objects = response
            .contents()
            .iter()
            .map(|object| ObjectMeta {
                key: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or(0).max(0) as u64,
                modified: object
                    .last_modified()
                    .and_then(|dt| Timestamp::from_second(dt.secs()).ok()),
            })
            .collect();

        let next = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(|s| s.to_string())
        } else {
            None
        };

        Ok(ListPage {
            dirs,
            objects,
            next,
        })
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        match self
            .inner
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: response.content_length().unwrap_or(0).max(0) as u64,
                modified: response
                    .last_modified()
                    .and_then(|dt| Timestamp::from_second(dt.secs()).ok()),
            })),
            Err(e) => {
                let msg = Self::format_sdk_error(&e);
                if Self::is_missing(&msg) {
                    Ok(None)
                } else {
                    Err(Error::Network(msg))
                }
            }
        }
    }

    async fn get(&self, key: &str) -> Result<GetObject> {
        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let msg = Self::format_sdk_error(&e);
                if Self::is_missing(&msg) {
                    Error::NotFound(key.to_string())
                } else {
                    Error::Network(msg)
                }
            })?;

        let length = response.content_length().unwrap_or(0).max(0) as u64;
        Ok(GetObject {
            length,
            body: Box::pin(response.body.into_async_read()),
        })
    }

    async fn put(&self, key: &str, data: Bytes, storage_class: &str) -> Result<()> {
        self.inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .storage_class(Self::storage_class(storage_class))
            .content_length(data.len() as i64)
            .body(aws_sdk_s3::primitives::ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        Ok(())
    }

    async fn copy(&self, src_key: &str, dst_key: &str, storage_class: &str) -> Result<()> {
        let copy_source = format!("{}/{}", self.bucket, src_key);
        self.inner
            .copy_object()
            .copy_source(copy_source)
            .bucket(&self.bucket)
            .key(dst_key)
            .storage_class(Self::storage_class(storage_class))
            .send()
            .await
            .map_err(|e| {
                let msg = Self::format_sdk_error(&e);
                if Self::is_missing(&msg) {
                    Error::NotFound(src_key.to_string())
                } else {
                    Error::Network(msg)
                }
            })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        Ok(())
    }

    async fn initiate_multipart(&self, key: &str, storage_class: &str) -> Result<String> {
        let response = self
            .inner
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .storage_class(Self::storage_class(storage_class))
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        response
            .upload_id()
            .map(|id| id.to_string())
            .ok_or_else(|| Error::Network(format!("no upload id returned for {key}")))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<PartTag> {
        let size = data.len();
        let response = self
            .inner
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(size as i64)
            .body(aws_sdk_s3::primitives::ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        let etag = response
            .e_tag()
            .map(|t| t.trim_matches('"').to_string())
            .ok_or_else(|| {
                Error::Network(format!("no etag returned for part {part_number} of {key}"))
            })?;

        tracing::debug!(key, upload_id, part_number, size, "uploaded part");
        Ok(PartTag { part_number, etag })
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<PartTag>,
    ) -> Result<()> {
        use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};

        let completed: Vec<CompletedPart> = parts
            .into_iter()
            .map(|tag| {
                CompletedPart::builder()
                    .part_number(tag.part_number)
                    .e_tag(tag.etag)
                    .build()
            })
            .collect();

        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_missing_detection() {
        assert!(S3Client::is_missing("Service error: NotFound (code: 404)"));
        assert!(S3Client::is_missing("NoSuchKey: the key does not exist"));
        assert!(!S3Client::is_missing("Service error: AccessDenied"));
    }

    #[test]
    fn test_options_reject_malformed_address() {
        let err = parse_store_url("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn test_storage_class_from_label() {
        let sc = S3Client::storage_class("STANDARD");
        assert_eq!(sc.as_str(), "STANDARD");
        let sc = S3Client::storage_class("GLACIER");
        assert_eq!(sc.as_str(), "GLACIER");
    }
}
