//! Firestore error types.

use gstash_auth::AuthError;
use thiserror::Error;

/// Result type for Firestore operations.
pub type FirestoreResult<T> = Result<T, FirestoreError>;

/// Message returned when the service-account triple is incomplete.
pub const INVALID_CREDENTIALS: &str =
    "invalid firestore credentials: project id, client email or private key are missing";

/// Errors that can occur during Firestore operations.
#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("{0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AuthError> for FirestoreError {
    fn from(err: AuthError) -> Self {
        if err.is_configuration() {
            Self::Config(err.to_string())
        } else {
            Self::AuthError(err.to_string())
        }
    }
}

impl FirestoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::AuthError(message),
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            _ => Self::RequestFailed { status, message },
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            FirestoreError::AuthError(_) => Some(401),
            FirestoreError::PermissionDenied(_) => Some(403),
            FirestoreError::NotFound(_) => Some(404),
            FirestoreError::AlreadyExists(_) => Some(409),
            FirestoreError::RequestFailed { status, .. } => Some(*status),
            FirestoreError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, FirestoreError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            FirestoreError::from_http_status(404, "gone"),
            FirestoreError::NotFound(_)
        ));
        assert!(matches!(
            FirestoreError::from_http_status(403, "nope"),
            FirestoreError::PermissionDenied(_)
        ));

        let err = FirestoreError::from_http_status(503, "unavailable");
        assert_eq!(err.http_status(), Some(503));
        assert_eq!(err.to_string(), "Request failed (503): unavailable");
    }

    #[test]
    fn test_config_message_is_verbatim() {
        let err = FirestoreError::config(INVALID_CREDENTIALS);
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);
        assert_eq!(err.http_status(), None);
    }
}
