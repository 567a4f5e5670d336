//! Bucket client: uploads, staged uploads, folder sync, copies and URL fetches.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::batch::run_batch;
use crate::error::{StorageError, StorageResult};
use crate::gcs::GcsStore;
use crate::metadata::{merge_metadata, ObjectMetadata};
use crate::metrics::record_request;
use crate::options::{BatchPolicy, StorageOptions};
use crate::staging::StagingArea;
use crate::store::{ObjectInfo, ObjectStore};
use crate::sync::{list_files, relative_key};

/// One server-side copy within the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyItem {
    pub src: String,
    pub dest: String,
}

impl CopyItem {
    pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
        }
    }
}

/// Result of [`StorageClient::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Body streamed to a local file.
    Saved { path: PathBuf, bytes: u64 },
    /// Body buffered as text.
    Text(String),
}

/// Client for one bucket.
///
/// Construction resolves credentials and prepares the staging directory; both
/// fail before any network I/O.
pub struct StorageClient<S: ObjectStore = GcsStore> {
    store: S,
    staging: StagingArea,
    default_metadata: HashMap<String, String>,
    max_concurrency: usize,
    batch_policy: BatchPolicy,
    http: reqwest::Client,
}

impl StorageClient<GcsStore> {
    /// Create a Cloud Storage client.
    pub async fn new(options: StorageOptions) -> StorageResult<Self> {
        options.validate()?;
        let credentials = options.credentials()?;
        let store = GcsStore::from_options(&options, &credentials)?;
        Self::with_store(store, &options).await
    }

    /// Create a client from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        Self::new(StorageOptions::from_env()?).await
    }
}

impl<S: ObjectStore> StorageClient<S> {
    /// Create a client over any store. Credentials are not consulted.
    pub async fn with_store(store: S, options: &StorageOptions) -> StorageResult<Self> {
        options.validate()?;

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .user_agent(concat!("gstash-storage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StorageError::Http)?;

        let staging = StagingArea::prepare(options.staging_dir()).await?;

        info!(
            bucket = %options.bucket_name,
            staging_dir = %staging.dir().display(),
            max_concurrency = options.max_concurrency,
            "Created storage client"
        );

        Ok(Self {
            store,
            staging,
            default_metadata: options.default_metadata.clone(),
            max_concurrency: options.max_concurrency,
            batch_policy: options.batch_policy,
            http,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Upload a local file to `key` with merged metadata.
    pub async fn upload(
        &self,
        path: &Path,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<ObjectInfo> {
        let merged = merge_metadata(&self.default_metadata, metadata);
        self.store.upload_file(path, key, &merged).await
    }

    /// Upload bytes through a scratch file. The scratch file is removed
    /// whether or not the upload succeeds, and a failed removal never replaces
    /// the upload result.
    pub async fn upload_data(
        &self,
        data: &[u8],
        key: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<ObjectInfo> {
        let staged = self.staging.stage(data).await?;
        let result = self.upload(staged.path(), key, metadata).await;
        if let Err(e) = staged.remove().await {
            warn!(key = %key, "Failed to remove staged file: {}", e);
        }
        result
    }

    /// Delete every object under `prefix`. Returns how many were deleted.
    pub async fn delete_by_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let objects = self.store.list(prefix).await?;
        if objects.is_empty() {
            debug!("No objects under prefix {}", prefix);
            return Ok(0);
        }

        let tasks = objects
            .into_iter()
            .map(|obj| {
                let label = obj.key.clone();
                let fut = async move { self.store.delete(&obj.key).await };
                (label, fut)
            })
            .collect::<Vec<_>>();
        let deleted = run_batch("delete", tasks, self.max_concurrency, self.batch_policy).await?;

        let count = deleted.into_iter().filter(|d| *d).count();
        info!("Deleted {} objects under prefix {}", count, prefix);
        Ok(count)
    }

    /// Fetch an arbitrary URL. With a path the body is streamed to that file;
    /// without one it is returned as text.
    pub async fn download(&self, url: &str, path: Option<&Path>) -> StorageResult<DownloadOutcome> {
        let span = info_span!("storage_request", operation = "fetch", url = %url);
        let start = Instant::now();
        let result = self.fetch(url, path).instrument(span).await;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request("fetch", status, start.elapsed().as_millis() as f64);

        result
    }

    async fn fetch(&self, url: &str, path: Option<&Path>) -> StorageResult<DownloadOutcome> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::api("download", status.as_u16(), body));
        }

        let Some(path) = path else {
            return Ok(DownloadOutcome::Text(response.text().await?));
        };

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Saved {} bytes from {} to {}", bytes, url, path.display());
        Ok(DownloadOutcome::Saved {
            path: path.to_path_buf(),
            bytes,
        })
    }

    /// Copy objects within the bucket, concurrently.
    pub async fn copy(&self, items: &[CopyItem]) -> StorageResult<Vec<ObjectInfo>> {
        let tasks = items
            .iter()
            .map(|item| {
                let fut = async move { self.store.copy(&item.src, &item.dest).await };
                (item.src.clone(), fut)
            })
            .collect::<Vec<_>>();

        let copied = run_batch("copy", tasks, self.max_concurrency, self.batch_policy).await?;
        info!("Copied {} objects", copied.len());
        Ok(copied)
    }

    /// Upload every file under `root` to `prefix` + its relative path.
    ///
    /// Keys are plain concatenation, so a prefix meant as a directory should
    /// end with `/`. Uploads that finished before a failure are kept.
    pub async fn upload_folder(&self, root: &Path, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let files = list_files(root).await?;
        let entries = files
            .into_iter()
            .map(|path| relative_key(root, &path).map(|rel| (path, format!("{}{}", prefix, rel))))
            .collect::<StorageResult<Vec<_>>>()?;

        debug!("Uploading {} files from {}", entries.len(), root.display());

        let no_metadata = ObjectMetadata::new();
        let no_metadata = &no_metadata;
        let tasks = entries
            .into_iter()
            .map(|(path, key)| {
                let label = path.display().to_string();
                let fut = async move { self.upload(&path, &key, no_metadata).await };
                (label, fut)
            })
            .collect::<Vec<_>>();

        let uploaded = run_batch("upload_folder", tasks, self.max_concurrency, self.batch_policy).await?;
        info!("Uploaded {} files from {} to {}", uploaded.len(), root.display(), prefix);
        Ok(uploaded)
    }

    /// Object bytes, or `None` when the key does not exist.
    pub async fn download_object(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.store.download(key).await
    }

    pub async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        self.store.list(prefix).await
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.store.list(key).await?.iter().any(|obj| obj.key == key))
    }
}
