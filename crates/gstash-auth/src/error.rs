//! Authentication error types.

use thiserror::Error;

/// Result type for credential and token operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while resolving credentials or fetching tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Neither credential mode is fully specified.
    #[error("{0}")]
    MissingCredentials(String),

    /// Credentials are present but cannot be turned into a token provider.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Failed to obtain auth token: {0}")]
    Token(String),
}

impl AuthError {
    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingCredentials(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidCredentials(msg.into())
    }

    /// True for errors raised before any network I/O took place.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredentials(_) | AuthError::InvalidCredentials(_)
        )
    }
}
