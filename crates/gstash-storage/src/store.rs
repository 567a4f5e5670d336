//! Object store seam.
//!
//! The [`crate::StorageClient`] only talks to a bucket through this trait.
//! [`crate::GcsStore`] is the Cloud Storage implementation and
//! [`crate::MemoryStore`] keeps objects in process.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::metadata::ObjectMetadata;

/// Information about a stored object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    /// Size in bytes
    pub size: u64,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    /// Store-specific version token
    pub generation: Option<String>,
    /// RFC 3339 timestamp of the last update
    pub updated: Option<String>,
    /// Custom key/value metadata
    pub metadata: BTreeMap<String, String>,
}

/// Bucket-scoped object storage.
pub trait ObjectStore: Send + Sync + 'static {
    /// Upload a local file to `key`, creating or replacing the object.
    fn upload_file(
        &self,
        path: &Path,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> impl Future<Output = StorageResult<ObjectInfo>> + Send;

    /// Object contents, or `None` when the key does not exist.
    fn download(&self, key: &str) -> impl Future<Output = StorageResult<Option<Vec<u8>>>> + Send;

    /// Every object whose key starts with `prefix`.
    fn list(&self, prefix: &str) -> impl Future<Output = StorageResult<Vec<ObjectInfo>>> + Send;

    /// Delete one object. Returns false when it did not exist.
    fn delete(&self, key: &str) -> impl Future<Output = StorageResult<bool>> + Send;

    /// Server-side copy within the bucket.
    fn copy(&self, src: &str, dest: &str) -> impl Future<Output = StorageResult<ObjectInfo>> + Send;
}
