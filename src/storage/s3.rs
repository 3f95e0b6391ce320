//! S3-backed document source.

use async_trait::async_trait;
use aws_sdk_s3::Client;

use crate::error::StorageError;

use super::source::{file_name, DocumentIdentity, DocumentSource, SourceDocument};

/// Create an S3 client with optional custom endpoint.
///
/// A custom endpoint (MinIO, LocalStack, ...) switches the client to
/// path-style addressing.
pub async fn create_s3_client(endpoint_url: Option<&str>) -> Client {
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let mut builder = aws_sdk_s3::config::Builder::from(&config);

    if let Some(url) = endpoint_url {
        builder = builder.endpoint_url(url).force_path_style(true);
    }

    Client::from_conf(builder.build())
}

/// Marker of an object version from its ETag and Last-Modified headers.
fn object_marker(e_tag: Option<&str>, last_modified: Option<&aws_sdk_s3::primitives::DateTime>) -> String {
    format!(
        "{}-{}",
        e_tag.unwrap_or_default().trim_matches('"'),
        last_modified.map(|t| t.secs()).unwrap_or(0)
    )
}

/// Document source reading objects from an S3 bucket.
///
/// The document identifier (optionally prefixed) is the object key. The
/// marker combines the ETag and Last-Modified headers.
#[derive(Clone)]
pub struct S3DocumentSource {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3DocumentSource {
    /// Create a source for `bucket`.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: None,
        }
    }

    /// Restrict documents to keys under `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key for a document identifier.
    pub fn object_key(&self, document_id: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                document_id.trim_start_matches('/')
            ),
            None => document_id.to_string(),
        }
    }

    fn map_error<E>(&self, key: &str, err: aws_sdk_s3::error::SdkError<E>) -> StorageError
    where
        E: std::error::Error + 'static,
    {
        let status_is_404 = err
            .raw_response()
            .map(|r| r.status().as_u16() == 404)
            .unwrap_or(false);
        let message = err.to_string();

        if status_is_404 || message.contains("NoSuchKey") || message.contains("NotFound") {
            StorageError::NotFound(format!("s3://{}/{}", self.bucket, key))
        } else {
            StorageError::S3(message)
        }
    }
}

#[async_trait]
impl DocumentSource for S3DocumentSource {
    async fn identify(&self, document_id: &str) -> Result<DocumentIdentity, StorageError> {
        let key = self.object_key(document_id);
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| self.map_error(&key, e))?;

        Ok(DocumentIdentity::new(
            document_id,
            object_marker(head.e_tag(), head.last_modified()),
        ))
    }

    async fn open(&self, document_id: &str) -> Result<SourceDocument, StorageError> {
        let key = self.object_key(document_id);

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| self.map_error(&key, e))?;

        // Identity of the object version actually fetched
        let identity = DocumentIdentity::new(
            document_id,
            object_marker(resp.e_tag(), resp.last_modified()),
        );
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?
            .into_bytes();

        Ok(SourceDocument {
            identity,
            name: file_name(document_id).to_string(),
            data,
        })
    }
}
