//! Storage client options.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use gstash_auth::{CredentialFields, Credentials};

use crate::error::{StorageError, StorageResult};

/// Default number of concurrent uploads/copies in a batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Name of the scratch directory created under the system temp dir.
pub const DEFAULT_STAGING_DIR_NAME: &str = "gstash-staging";

/// How a batch of concurrent operations reports failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// The first failure fails the batch; in-flight items are abandoned.
    #[default]
    FailFast,
    /// Every item runs; all failures are reported together.
    CollectAll,
}

/// Options for [`crate::StorageClient`].
#[derive(Debug, Clone)]
pub struct StorageOptions {
    pub bucket_name: String,
    pub key_filename: Option<PathBuf>,
    pub google_project_id: Option<String>,
    pub google_client_email: Option<String>,
    pub google_private_key: Option<String>,
    /// Applied to every upload, below per-call metadata.
    pub default_metadata: HashMap<String, String>,
    /// Scratch directory for staged uploads. Emptied at construction.
    pub staging_dir: Option<PathBuf>,
    pub max_concurrency: usize,
    pub batch_policy: BatchPolicy,
    /// Storage endpoint override (emulators). Requests carry no token.
    pub emulator_host: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            bucket_name: String::new(),
            key_filename: None,
            google_project_id: None,
            google_client_email: None,
            google_private_key: None,
            default_metadata: HashMap::new(),
            staging_dir: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            batch_policy: BatchPolicy::FailFast,
            emulator_host: None,
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl StorageOptions {
    /// Options for a bucket with every other field defaulted.
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            ..Default::default()
        }
    }

    /// Create options from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let bucket_name = env_opt("GCS_BUCKET_NAME")
            .ok_or_else(|| StorageError::config_error("GCS_BUCKET_NAME not set"))?;

        let max_concurrency = match env_opt("STORAGE_MAX_CONCURRENCY") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                StorageError::config_error(format!(
                    "STORAGE_MAX_CONCURRENCY must be a positive integer, got {:?}",
                    raw
                ))
            })?,
            None => DEFAULT_MAX_CONCURRENCY,
        };

        let batch_policy = match env_opt("STORAGE_BATCH_POLICY").as_deref() {
            Some("collect_all") | Some("collect-all") => BatchPolicy::CollectAll,
            _ => BatchPolicy::FailFast,
        };

        Ok(Self {
            bucket_name,
            key_filename: env_opt("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            google_project_id: env_opt("GCP_PROJECT_ID"),
            google_client_email: env_opt("GCP_CLIENT_EMAIL"),
            google_private_key: env_opt("GCP_PRIVATE_KEY"),
            staging_dir: env_opt("STORAGE_STAGING_DIR").map(PathBuf::from),
            max_concurrency,
            batch_policy,
            emulator_host: env_opt("STORAGE_EMULATOR_HOST"),
            ..Default::default()
        })
    }

    pub fn with_default_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn with_max_concurrency(mut self, width: usize) -> Self {
        self.max_concurrency = width;
        self
    }

    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    /// Resolve the credential fields into one credential shape.
    pub fn credentials(&self) -> StorageResult<Credentials> {
        let fields = CredentialFields {
            project_id: self.google_project_id.clone(),
            client_email: self.google_client_email.clone(),
            private_key: self.google_private_key.clone(),
            key_filename: self.key_filename.clone(),
        };
        Ok(Credentials::resolve(&fields)?)
    }

    /// Check everything that can be checked without I/O.
    pub fn validate(&self) -> StorageResult<()> {
        if self.bucket_name.trim().is_empty() {
            return Err(StorageError::config_error("bucket name is empty"));
        }
        if self.max_concurrency == 0 {
            return Err(StorageError::config_error("max_concurrency must be at least 1"));
        }
        Ok(())
    }

    /// Scratch directory, falling back to one under the system temp dir.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_STAGING_DIR_NAME))
    }
}
