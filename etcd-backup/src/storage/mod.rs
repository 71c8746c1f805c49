//! Object storage seam for finished artifacts.

pub mod s3;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

pub use s3::S3Store;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("{operation} {key} failed: {reason}")]
    Request {
        operation: &'static str,
        key: String,
        reason: String,
    },

    #[error("store reported no size for {0}")]
    MissingSize(String),
}

/// Destination for artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the file at `path` under `key` and return the size the store
    /// reports for the stored object.
    async fn put_file(&self, path: &Path, key: &str) -> Result<u64, StorageError>;
}
