//! Firestore REST API client.
//!
//! - Strict service-account configuration, checked before any I/O
//! - Token caching with one refresh on an expired-token response
//! - Observability (tracing spans, metrics)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gstash_auth::{CredentialFields, Credentials, TokenCache, FIRESTORE_SCOPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult, INVALID_CREDENTIALS};
use crate::metrics::{record_listed, record_request};
use crate::refs::{CollectionRef, DocumentRef};
use crate::types::{Document, ListDocumentsResponse, Value};

/// Default database id.
pub const DEFAULT_DATABASE_ID: &str = "(default)";

const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Firestore client options.
#[derive(Clone)]
pub struct FirestoreOptions {
    pub project_id: Option<String>,
    pub client_email: Option<String>,
    pub private_key: Option<String>,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Endpoint override (emulators). Requests carry no token.
    pub emulator_host: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for FirestoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreOptions")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("database_id", &self.database_id)
            .field("emulator_host", &self.emulator_host)
            .finish()
    }
}

impl Default for FirestoreOptions {
    fn default() -> Self {
        Self {
            project_id: None,
            client_email: None,
            private_key: None,
            database_id: DEFAULT_DATABASE_ID.to_string(),
            emulator_host: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl FirestoreOptions {
    pub fn new(
        project_id: impl Into<String>,
        client_email: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            project_id: Some(project_id.into()),
            client_email: Some(client_email.into()),
            private_key: Some(private_key.into()),
            ..Default::default()
        }
    }

    /// Create options from environment variables.
    pub fn from_env() -> Self {
        Self {
            project_id: env_opt("GCP_PROJECT_ID"),
            client_email: env_opt("GCP_CLIENT_EMAIL").or_else(|| env_opt("FIRESTORE_CLIENT_EMAIL")),
            private_key: env_opt("GCP_PRIVATE_KEY").or_else(|| env_opt("FIRESTORE_PRIVATE_KEY")),
            database_id: env_opt("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|| DEFAULT_DATABASE_ID.to_string()),
            emulator_host: env_opt("FIRESTORE_EMULATOR_HOST"),
            ..Default::default()
        }
    }

    /// The service-account triple. Key files are not accepted here.
    pub fn credentials(&self) -> FirestoreResult<Credentials> {
        let fields = CredentialFields {
            project_id: self.project_id.clone(),
            client_email: self.client_email.clone(),
            private_key: self.private_key.clone(),
            key_filename: None,
        };
        Credentials::resolve(&fields).map_err(|_| FirestoreError::config(INVALID_CREDENTIALS))
    }
}

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    base_url: String,
    document_root: String,
    token_cache: Option<Arc<TokenCache>>,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub async fn new(options: FirestoreOptions) -> FirestoreResult<Self> {
        let credentials = options.credentials()?;
        let (project_id, client_email) = match &credentials {
            Credentials::ServiceAccount {
                project_id,
                client_email,
                ..
            } => (project_id.clone(), client_email.clone()),
            Credentials::KeyFile(_) => return Err(FirestoreError::config(INVALID_CREDENTIALS)),
        };

        let (endpoint, token_cache) = match options.emulator_host.as_deref() {
            Some(host) => (emulator_endpoint(host), None),
            None => {
                let provider = credentials.token_provider()?;
                let cache = TokenCache::new(provider, FIRESTORE_SCOPE);
                (FIRESTORE_ENDPOINT.to_string(), Some(Arc::new(cache)))
            }
        };

        let http = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("gstash-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let document_root = format!(
            "projects/{}/databases/{}/documents",
            project_id, options.database_id
        );
        let base_url = format!("{}/v1/{}", endpoint, document_root);

        info!(
            client_email = %client_email,
            project_id = %project_id,
            database_id = %options.database_id,
            "Initialized Firestore client"
        );

        Ok(Self {
            http,
            base_url,
            document_root,
            token_cache,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        Self::new(FirestoreOptions::from_env()).await
    }

    /// Handle to a collection.
    pub fn collection(&self, name: impl Into<String>) -> CollectionRef {
        CollectionRef::new(self.clone(), name.into())
    }

    /// Handle to one document.
    pub fn document(&self, collection: impl Into<String>, key: impl Into<String>) -> DocumentRef {
        DocumentRef::new(self.clone(), collection.into(), key.into())
    }

    /// Resource name as used in document `name` fields.
    pub fn full_document_name(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.document_root, collection, doc_id)
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(collection))
    }

    fn document_url(&self, collection: &str, doc_id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(doc_id)
        )
    }

    /// Get a document.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_url(collection, doc_id);

        self.execute_request("get_document", collection, Some(doc_id), async {
            let response = self.send_authorized(&url, |http| http.get(&url)).await?;

            match response.status() {
                StatusCode::OK => Ok(Some(response.json().await?)),
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create a document; fails if it already exists.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = self.collection_url(collection);
        let body = Document::new(fields);

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |http| {
                    http.post(&url).query(&[("documentId", doc_id)]).json(&body)
                })
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json().await?),
                StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create or replace a document with exactly `fields`.
    pub async fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = self.document_url(collection, doc_id);
        let body = Document::new(fields);

        self.execute_request("set_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |http| http.patch(&url).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK => Ok(response.json().await?),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Merge `fields` into an existing document. Fields not named are kept.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = self.document_url(collection, doc_id);
        let mut params: Vec<(&str, String)> = fields
            .keys()
            .map(|f| ("updateMask.fieldPaths", field_path(f)))
            .collect();
        params.sort();
        params.push(("currentDocument.exists", "true".to_string()));
        let body = Document::new(fields);

        self.execute_request("update_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |http| http.patch(&url).query(&params).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK => Ok(response.json().await?),
                StatusCode::NOT_FOUND => {
                    Err(FirestoreError::not_found(format!("{}/{}", collection, doc_id)))
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Delete a document. Deleting a missing document succeeds.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        let url = self.document_url(collection, doc_id);

        self.execute_request("delete_document", collection, Some(doc_id), async {
            let response = self.send_authorized(&url, |http| http.delete(&url)).await?;

            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
                StatusCode::NOT_FOUND => {
                    debug!("Document {}/{} already deleted (idempotent)", collection, doc_id);
                    Ok(())
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// List one page of documents in a collection.
    pub async fn list_documents(
        &self,
        collection: &str,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> FirestoreResult<ListDocumentsResponse> {
        let url = self.collection_url(collection);
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(size) = page_size {
            params.push(("pageSize", size.to_string()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        self.execute_request("list_documents", collection, None, async {
            let response = self
                .send_authorized(&url, |http| http.get(&url).query(&params))
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let list: ListDocumentsResponse = response.json().await?;
                    record_listed(collection, list.documents.as_ref().map_or(0, Vec::len));
                    Ok(list)
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Send a request, attaching a bearer token when authenticated. An
    /// expired-token response drops the cached token and resends once.
    async fn send_authorized<F>(&self, url: &str, build: F) -> FirestoreResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let Some(cache) = &self.token_cache else {
            return Ok(build(&self.http).send().await?);
        };

        let token = cache.get_token().await?;
        let response = build(&self.http).bearer_auth(&token).send().await?;
        let status = response.status();
        if status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(FirestoreError::from_http_status(
                status.as_u16(),
                format!("{} failed: {}", url, body),
            ));
        }

        cache.invalidate().await;
        let token = cache.get_token().await?;
        Ok(build(&self.http).bearer_auth(&token).send().await?)
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = if let Some(id) = doc_id {
            info_span!("firestore_request", operation = %operation, collection = %collection, doc_id = %id)
        } else {
            info_span!("firestore_request", operation = %operation, collection = %collection)
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

fn emulator_endpoint(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

/// Field path for an update mask; names that are not plain identifiers are
/// backtick-quoted.
fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
