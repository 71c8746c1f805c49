//! S3 artifact storage.

use super::{ObjectStore, StorageError};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::path::Path;
use tracing::info;

pub struct S3Store {
    client: S3Client,
    bucket: String,
}

impl S3Store {
    /// Build a client with static credentials. No request is made here.
    pub fn new(config: &StorageConfig, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "etcd-backup");

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if config.path_style {
            builder = builder.force_path_style(true);
        }

        info!(bucket = %config.bucket, region = %config.region, "S3 artifact store configured");

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_file(&self, path: &Path, key: &str) -> Result<u64, StorageError> {
        let body = ByteStream::from_path(path).await.map_err(|e| StorageError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Request {
                operation: "PutObject",
                key: key.to_string(),
                reason: DisplayErrorContext(e).to_string(),
            })?;

        // Read the object back so the reported size is what S3 actually holds
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Request {
                operation: "HeadObject",
                key: key.to_string(),
                reason: DisplayErrorContext(e).to_string(),
            })?;

        let size = head
            .content_length()
            .filter(|len| *len >= 0)
            .ok_or_else(|| StorageError::MissingSize(key.to_string()))?;

        info!("AWS S3: object {} successfully uploaded to bucket {} ({} bytes)", key, self.bucket, size);
        Ok(size as u64)
    }
}
