//! Storage error types.

use gstash_auth::AuthError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("{operation} failed with HTTP {status}: {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("{} of {} batch items failed", .failures.len(), .failures.len() + .succeeded)]
    Batch {
        succeeded: usize,
        failures: Vec<BatchFailure>,
    },
}

/// One failed member of a batch run under the collect-all policy.
#[derive(Debug)]
pub struct BatchFailure {
    /// Key or path identifying the item.
    pub item: String,
    pub error: StorageError,
}

impl From<AuthError> for StorageError {
    fn from(err: AuthError) -> Self {
        if err.is_configuration() {
            Self::ConfigError(err.to_string())
        } else {
            Self::Auth(err.to_string())
        }
    }
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn api(operation: &str, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Raised before any I/O: incomplete or malformed options.
    pub fn is_configuration(&self) -> bool {
        matches!(self, StorageError::ConfigError(_))
    }

    /// Failure reported by the object store or the HTTP client.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StorageError::Auth(_)
                | StorageError::NotFound(_)
                | StorageError::Api { .. }
                | StorageError::Http(_)
        )
    }

    /// Local read, write or traversal failure.
    pub fn is_filesystem(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            StorageError::NotFound(_) => Some(404),
            StorageError::Api { status, .. } => Some(*status),
            StorageError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
