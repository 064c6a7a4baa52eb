//! Object storage for original attachment bytes.
//!
//! Production uses S3 (or any S3-compatible endpoint such as MinIO). Every
//! call is a single attempt bounded by the configured deadline; retrying is
//! the caller's business.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object storage is not configured")]
    NotConfigured,

    #[error("object storage call exceeded {0:?}")]
    Timeout(Duration),

    #[error("S3 error: {0}")]
    S3(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Stores `content` under `key` and returns the reference to persist.
    /// Content type is guessed from the key's extension when not given.
    async fn upload(
        &self,
        key: &str,
        content: Bytes,
        content_type: Option<&str>,
    ) -> Result<String, BlobError>;

    /// Time-limited inline URL. Degrades to the unsigned public URL when
    /// signing fails.
    async fn signed_url(&self, blob_ref: &str) -> String;

    async fn download(&self, blob_ref: &str) -> Result<Bytes, BlobError>;
}

pub fn guess_content_type(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

pub struct S3BlobStore {
    client: Option<S3Client>,
    bucket: String,
    public_base_url: String,
    ttl: Duration,
    deadline: Duration,
}

impl S3BlobStore {
    /// Builds the client for MinIO (local, path-style) or AWS. Without a
    /// bucket and credentials the store stays unconfigured and every upload
    /// is skipped.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let client = match (
            config.bucket.as_ref(),
            config.access_key_id.as_ref(),
            config.secret_access_key.as_ref(),
        ) {
            (Some(_), Some(key_id), Some(secret)) => {
                let credentials = Credentials::new(key_id, secret, None, None, "screener-static");
                let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .credentials_provider(credentials);
                if let Some(endpoint) = &config.endpoint {
                    loader = loader.endpoint_url(endpoint);
                }
                let sdk_config = loader.load().await;
                let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                    .force_path_style(config.endpoint.is_some())
                    .build();
                info!("S3 client initialized");
                Some(S3Client::from_conf(s3_config))
            }
            _ => {
                warn!("S3 bucket or credentials missing; attachments will not be stored");
                None
            }
        };

        Self {
            client,
            bucket: config.bucket.clone().unwrap_or_default(),
            public_base_url: config
                .public_base_url
                .clone()
                .unwrap_or_else(|| "https://s3.amazonaws.com".to_string()),
            ttl: config.signed_url_ttl,
            deadline: config.deadline,
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            self.bucket,
            key.trim_start_matches('/')
        )
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, BlobError>
    where
        F: Future<Output = Result<T, BlobError>>,
    {
        tokio::time::timeout(self.deadline, call)
            .await
            .map_err(|_| BlobError::Timeout(self.deadline))?
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn upload(
        &self,
        key: &str,
        content: Bytes,
        content_type: Option<&str>,
    ) -> Result<String, BlobError> {
        let client = self.client.as_ref().ok_or(BlobError::NotConfigured)?;
        let content_type = content_type
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(key));

        self.bounded(async {
            client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(content))
                .content_type(content_type)
                .send()
                .await
                .map_err(|e| BlobError::S3(format!("upload failed: {e}")))
        })
        .await?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(key.to_string())
    }

    async fn signed_url(&self, blob_ref: &str) -> String {
        let Some(client) = self.client.as_ref() else {
            return self.public_url(blob_ref);
        };

        let signed = async {
            let presigning = PresigningConfig::expires_in(self.ttl)
                .map_err(|e| BlobError::S3(format!("presigning config: {e}")))?;
            let request = client
                .get_object()
                .bucket(&self.bucket)
                .key(blob_ref)
                .response_content_disposition("inline")
                .presigned(presigning)
                .await
                .map_err(|e| BlobError::S3(format!("presign failed: {e}")))?;
            Ok::<_, BlobError>(request.uri().to_string())
        };

        match self.bounded(signed).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Signing {blob_ref} failed, returning public URL: {e}");
                self.public_url(blob_ref)
            }
        }
    }

    async fn download(&self, blob_ref: &str) -> Result<Bytes, BlobError> {
        let client = self.client.as_ref().ok_or(BlobError::NotConfigured)?;

        self.bounded(async {
            let object = client
                .get_object()
                .bucket(&self.bucket)
                .key(blob_ref)
                .send()
                .await
                .map_err(|e| BlobError::S3(format!("download failed: {e}")))?;
            let body = object
                .body
                .collect()
                .await
                .map_err(|e| BlobError::S3(format!("reading body failed: {e}")))?;
            Ok::<_, BlobError>(body.into_bytes())
        })
        .await
    }
}
