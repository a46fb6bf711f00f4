//! Object storage abstractions for the MinIO backend.

mod keys;
mod s3;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::StorageConfig;
use crate::Result;

pub use keys::{base_file_name, join_key, public_url, KeyStamp};
pub use s3::{S3Connector, S3Storage};

/// One entry returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// `true` for common prefixes reported by a non-recursive listing.
    pub is_prefix: bool,
}

/// Object payload together with its stored content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectData {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Operations the app needs from an S3-compatible bucket.
///
/// Every method targets the bucket the store was built for.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket the store operates on.
    fn bucket(&self) -> &str;

    /// Upload a staged file, returning the number of bytes sent.
    async fn put_file(&self, key: &str, path: &Path, content_type: Option<&str>) -> Result<u64>;

    async fn put_bytes(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>)
        -> Result<()>;

    async fn get_object(&self, key: &str) -> Result<ObjectData>;

    /// Whether an object exists under `key`.
    async fn stat_object(&self, key: &str) -> Result<bool>;

    async fn remove_object(&self, key: &str) -> Result<()>;

    async fn remove_objects(&self, keys: &[String]) -> Result<()>;

    /// List keys under `prefix`. Non-recursive listings fold deeper keys
    /// into prefix entries.
    async fn list_objects(&self, prefix: &str, recursive: bool) -> Result<Vec<ObjectInfo>>;

    async fn copy_object(&self, source_key: &str, dest_key: &str) -> Result<()>;

    async fn bucket_exists(&self) -> Result<bool>;

    async fn make_bucket(&self) -> Result<()>;

    async fn list_buckets(&self) -> Result<Vec<String>>;
}

/// Builds a store for a storage configuration.
///
/// The bridge reconnects per request so configuration edits apply
/// immediately.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, config: &StorageConfig) -> Result<Arc<dyn ObjectStore>>;
}

/// Guess a content type from a file name.
pub fn content_type_for(file_name: &str) -> Option<String> {
    mime_guess::from_path(file_name)
        .first()
        .map(|mime| mime.essence_str().to_string())
}
