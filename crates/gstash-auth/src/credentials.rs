//! Credential resolution.
//!
//! Two shapes are accepted:
//! - an explicit service account (project id, client email, private key)
//! - a path to a service-account JSON key file
//!
//! The explicit triple wins whenever all three fields are present. There is no
//! merging between the two shapes.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use gcp_auth::{CustomServiceAccount, TokenProvider};
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Token endpoint written into service-account JSON built from explicit fields.
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Message returned when neither credential shape is complete.
pub const MISSING_CREDENTIALS: &str = "credentials not found in storage options";

/// Raw, unvalidated credential fields as they arrive from options or env.
#[derive(Clone, Default)]
pub struct CredentialFields {
    pub project_id: Option<String>,
    pub client_email: Option<String>,
    pub private_key: Option<String>,
    pub key_filename: Option<PathBuf>,
}

impl fmt::Debug for CredentialFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialFields")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("key_filename", &self.key_filename)
            .finish()
    }
}

/// Validated credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ServiceAccount {
        project_id: String,
        client_email: String,
        private_key: String,
    },
    KeyFile(PathBuf),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccount {
                project_id,
                client_email,
                ..
            } => f
                .debug_struct("ServiceAccount")
                .field("project_id", project_id)
                .field("client_email", client_email)
                .finish_non_exhaustive(),
            Credentials::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Keys pasted into env files usually carry literal `\n` escapes.
fn normalize_private_key(key: &str) -> String {
    key.replace("\\n", "\n")
}

impl Credentials {
    /// Resolve raw fields into one credential shape.
    pub fn resolve(fields: &CredentialFields) -> AuthResult<Self> {
        if let (Some(project_id), Some(client_email), Some(private_key)) = (
            non_empty(&fields.project_id),
            non_empty(&fields.client_email),
            non_empty(&fields.private_key),
        ) {
            debug!(client_email = %client_email, "Resolved explicit service-account credentials");
            return Ok(Credentials::ServiceAccount {
                project_id: project_id.to_string(),
                client_email: client_email.to_string(),
                private_key: normalize_private_key(private_key),
            });
        }

        match &fields.key_filename {
            Some(path) if !path.as_os_str().is_empty() => {
                debug!(key_file = %path.display(), "Resolved key-file credentials");
                Ok(Credentials::KeyFile(path.clone()))
            }
            _ => Err(AuthError::missing(MISSING_CREDENTIALS)),
        }
    }

    /// Project id, when known without reading the key file.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Credentials::ServiceAccount { project_id, .. } => Some(project_id),
            Credentials::KeyFile(_) => None,
        }
    }

    /// Service-account JSON for the explicit shape.
    fn service_account_json(&self) -> Option<String> {
        match self {
            Credentials::ServiceAccount {
                project_id,
                client_email,
                private_key,
            } => Some(
                serde_json::json!({
                    "type": "service_account",
                    "project_id": project_id,
                    "client_email": client_email,
                    "private_key": private_key,
                    "token_uri": GOOGLE_TOKEN_URI,
                })
                .to_string(),
            ),
            Credentials::KeyFile(_) => None,
        }
    }

    /// Build a gcp_auth token provider for these credentials.
    pub fn token_provider(&self) -> AuthResult<Arc<dyn TokenProvider>> {
        let account = match self {
            Credentials::KeyFile(path) => CustomServiceAccount::from_file(path).map_err(|e| {
                AuthError::invalid(format!(
                    "failed to load key file {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Credentials::ServiceAccount { .. } => {
                let json = self.service_account_json().unwrap_or_default();
                CustomServiceAccount::from_json(&json)
                    .map_err(|e| AuthError::invalid(format!("bad service account: {}", e)))?
            }
        };

        Ok(Arc::new(account))
    }
}
