//! Cloud Storage bucket client.
//!
//! This crate provides:
//! - Uploads from a path or from bytes (through a scratch file)
//! - Recursive folder uploads under a key prefix
//! - Prefix deletes and concurrent in-bucket copies
//! - Fetching arbitrary URLs to a file or to text
//! - An [`ObjectStore`] seam with Cloud Storage and in-memory backends

pub mod batch;
pub mod client;
pub mod error;
pub mod gcs;
pub mod memory;
pub mod metadata;
pub mod metrics;
pub mod options;
pub mod staging;
pub mod store;
pub mod sync;

pub use client::{CopyItem, DownloadOutcome, StorageClient};
pub use error::{BatchFailure, StorageError, StorageResult};
pub use gcs::GcsStore;
pub use memory::MemoryStore;
pub use metadata::{merge_metadata, ObjectMetadata, DEFAULT_CACHE_CONTROL};
pub use options::{BatchPolicy, StorageOptions};
pub use staging::{StagedFile, StagingArea};
pub use store::{ObjectInfo, ObjectStore};
