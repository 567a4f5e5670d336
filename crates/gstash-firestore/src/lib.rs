//! Firestore REST API client.
//!
//! This crate provides:
//! - Collection and document handles with get/create/set/update/delete
//! - Paged collection listing
//! - Service account authentication via gcp_auth
//! - Emulator support through `FIRESTORE_EMULATOR_HOST`

pub mod client;
pub mod error;
pub mod metrics;
pub mod refs;
pub mod types;

pub use client::{FirestoreClient, FirestoreOptions, DEFAULT_DATABASE_ID};
pub use error::{FirestoreError, FirestoreResult, INVALID_CREDENTIALS};
pub use refs::{CollectionRef, DocumentRef};
pub use types::{Document, FromFirestoreValue, ListDocumentsResponse, ToFirestoreValue, Value};
