mod keys;
mod local;
mod s3;

pub use keys::ObjectKey;
pub use local::LocalFsStore;
pub use s3::S3Store;

pub use airgrid_core::{ByteStream, stream_from_bytes};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object already exists: {0}")]
    AlreadyExists(String),
    #[error("source stream failed for {key}: {message}")]
    Source { key: String, message: String },
    #[error("I/O error: {0}")]
    Io(String),
    #[error("store error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub etag: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Streams `body` to `key` without buffering it whole. Create-only: an
    /// existing key yields `AlreadyExists`, and readers never observe a
    /// partially written object.
    async fn put_stream(&self, key: &str, body: ByteStream) -> Result<StoredObject, StoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
