//! Google service-account credentials.
//!
//! This crate provides:
//! - Resolution of the two supported credential shapes (explicit
//!   service-account fields, or a key file on disk)
//! - Token providers backed by gcp_auth
//! - An access-token cache shared by the storage and Firestore clients

pub mod credentials;
pub mod error;
pub mod token_cache;

pub use credentials::{CredentialFields, Credentials};
pub use error::{AuthError, AuthResult};
pub use token_cache::{TokenCache, FIRESTORE_SCOPE, STORAGE_SCOPE};
