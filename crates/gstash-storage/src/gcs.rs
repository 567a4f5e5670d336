//! Cloud Storage JSON API backend.
//!
//! - Multipart uploads carrying the object resource and its bytes
//! - Paged listing by prefix
//! - Server-side copies through `rewriteTo`
//! - Token caching with one refresh on 401
//! - Tracing spans and request metrics per call

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use gstash_auth::{Credentials, TokenCache, STORAGE_SCOPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::metadata::{split_metadata, ObjectMetadata, CONTENT_TYPE_KEY};
use crate::metrics::record_request;
use crate::options::StorageOptions;
use crate::store::{ObjectInfo, ObjectStore};

/// Public Cloud Storage endpoint.
pub const GCS_ENDPOINT: &str = "https://storage.googleapis.com";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Object resource as returned by the JSON API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsObject {
    name: String,
    #[serde(default)]
    size: Option<String>,
    content_type: Option<String>,
    cache_control: Option<String>,
    generation: Option<String>,
    updated: Option<String>,
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
}

impl From<GcsObject> for ObjectInfo {
    fn from(obj: GcsObject) -> Self {
        Self {
            key: obj.name,
            size: obj.size.and_then(|s| s.parse().ok()).unwrap_or(0),
            content_type: obj.content_type,
            cache_control: obj.cache_control,
            generation: obj.generation,
            updated: obj.updated,
            metadata: obj.metadata.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsResponse {
    items: Option<Vec<GcsObject>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewriteResponse {
    done: bool,
    rewrite_token: Option<String>,
    resource: Option<GcsObject>,
}

/// Cloud Storage bucket client.
#[derive(Clone)]
pub struct GcsStore {
    http: Client,
    bucket: String,
    base_url: String,
    token_cache: Option<Arc<TokenCache>>,
}

impl GcsStore {
    /// Create a store authenticated with service-account credentials.
    pub fn with_credentials(
        options: &StorageOptions,
        credentials: &Credentials,
    ) -> StorageResult<Self> {
        let provider = credentials.token_provider()?;
        let cache = TokenCache::new(provider, STORAGE_SCOPE);
        Self::build(options, GCS_ENDPOINT.to_string(), Some(Arc::new(cache)))
    }

    /// Create an unauthenticated store against an emulator endpoint.
    pub fn emulator(options: &StorageOptions, host: &str) -> StorageResult<Self> {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host.trim_end_matches('/'))
        };
        Self::build(options, base_url, None)
    }

    /// Pick the emulator or the real endpoint from the options.
    pub fn from_options(options: &StorageOptions, credentials: &Credentials) -> StorageResult<Self> {
        match options.emulator_host.as_deref() {
            Some(host) => Self::emulator(options, host),
            None => Self::with_credentials(options, credentials),
        }
    }

    fn build(
        options: &StorageOptions,
        base_url: String,
        token_cache: Option<Arc<TokenCache>>,
    ) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .pool_max_idle_per_host(options.max_concurrency.max(1))
            .user_agent(concat!("gstash-storage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StorageError::Http)?;

        debug!(bucket = %options.bucket_name, base_url = %base_url, "Created GCS store");

        Ok(Self {
            http,
            bucket: options.bucket_name.clone(),
            base_url,
            token_cache,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(key)
        )
    }

    fn objects_url(&self) -> String {
        format!(
            "{}/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(&self.bucket)
        )
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(&self.bucket)
        )
    }

    fn rewrite_url(&self, src: &str, dest: &str) -> String {
        format!(
            "{}/rewriteTo/b/{}/o/{}",
            self.object_url(src),
            urlencoding::encode(&self.bucket),
            urlencoding::encode(dest)
        )
    }

    /// Send a request, attaching a bearer token when authenticated. A 401
    /// drops the cached token and the request is sent once more.
    async fn send_authorized<F>(&self, build: F) -> StorageResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let Some(cache) = &self.token_cache else {
            return Ok(build(&self.http).send().await?);
        };

        let token = cache.get_token().await?;
        let response = build(&self.http).bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Access token rejected, refreshing");
        cache.invalidate().await;
        let token = cache.get_token().await?;
        Ok(build(&self.http).bearer_auth(&token).send().await?)
    }

    async fn execute_request<T, F>(&self, operation: &str, key: &str, fut: F) -> StorageResult<T>
    where
        F: std::future::Future<Output = StorageResult<T>>,
    {
        let span = info_span!(
            "storage_request",
            operation = %operation,
            bucket = %self.bucket,
            key = %key
        );

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

    async fn error_response(operation: &str, status: StatusCode, response: Response) -> StorageError {
        let body = response.text().await.unwrap_or_default();
        StorageError::api(operation, status.as_u16(), body)
    }
}

/// Build a `multipart/related` body: object resource JSON, then the bytes.
fn multipart_body(resource: &serde_json::Value, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = format!("gstash-{}", Uuid::new_v4().simple());
    let mut body = Vec::with_capacity(data.len() + 512);

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(resource.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    (format!("multipart/related; boundary={}", boundary), body)
}

/// Object resource JSON for an upload.
fn object_resource(key: &str, metadata: &ObjectMetadata) -> (serde_json::Value, String) {
    let split = split_metadata(metadata);
    let content_type = split
        .resource_str(CONTENT_TYPE_KEY)
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let mut resource = serde_json::Map::new();
    resource.insert("name".to_string(), serde_json::Value::String(key.to_string()));
    for (field, value) in split.resource {
        resource.insert(field, value);
    }
    if !split.custom.is_empty() {
        resource.insert("metadata".to_string(), serde_json::json!(split.custom));
    }

    (serde_json::Value::Object(resource), content_type)
}

impl ObjectStore for GcsStore {
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<ObjectInfo> {
        debug!("Uploading {} to {}", path.display(), key);
        let data = tokio::fs::read(path).await?;
        let (resource, content_type) = object_resource(key, metadata);
        let (multipart_type, body) = multipart_body(&resource, &content_type, &data);
        let url = self.upload_url();

        let info = self
            .execute_request("upload", key, async {
                let response = self
                    .send_authorized(|http| {
                        http.post(&url)
                            .query(&[("uploadType", "multipart")])
                            .header(reqwest::header::CONTENT_TYPE, &multipart_type)
                            .body(body.clone())
                    })
                    .await?;

                match response.status() {
                    StatusCode::OK | StatusCode::CREATED => {
                        let obj: GcsObject = response.json().await?;
                        Ok(ObjectInfo::from(obj))
                    }
                    status => Err(Self::error_response("upload", status, response).await),
                }
            })
            .await?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(info)
    }

    async fn download(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        debug!("Downloading {}", key);
        let url = self.object_url(key);

        self.execute_request("download", key, async {
            let response = self
                .send_authorized(|http| http.get(&url).query(&[("alt", "media")]))
                .await?;

            match response.status() {
                StatusCode::OK => Ok(Some(response.bytes().await?.to_vec())),
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(Self::error_response("download", status, response).await),
            }
        })
        .await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        debug!("Listing objects with prefix: {}", prefix);
        let url = self.objects_url();

        self.execute_request("list", prefix, async {
            let mut objects = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let response = self
                    .send_authorized(|http| {
                        let mut request = http.get(&url).query(&[("prefix", prefix)]);
                        if let Some(token) = &page_token {
                            request = request.query(&[("pageToken", token.as_str())]);
                        }
                        request
                    })
                    .await?;

                let status = response.status();
                if status != StatusCode::OK {
                    return Err(Self::error_response("list", status, response).await);
                }

                let page: ListObjectsResponse = response.json().await?;
                objects.extend(page.items.unwrap_or_default().into_iter().map(ObjectInfo::from));

                match page.next_page_token {
                    Some(token) if !token.is_empty() => page_token = Some(token),
                    _ => break,
                }
            }

            Ok(objects)
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!("Deleting {}", key);
        let url = self.object_url(key);

        self.execute_request("delete", key, async {
            let response = self.send_authorized(|http| http.delete(&url)).await?;

            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                status => Err(Self::error_response("delete", status, response).await),
            }
        })
        .await
    }

    async fn copy(&self, src: &str, dest: &str) -> StorageResult<ObjectInfo> {
        debug!("Copying {} to {}", src, dest);
        let url = self.rewrite_url(src, dest);

        self.execute_request("copy", src, async {
            let mut rewrite_token: Option<String> = None;

            // Large objects need several rewrite calls; each returns a token.
            loop {
                let response = self
                    .send_authorized(|http| {
                        let mut request = http.post(&url).json(&serde_json::json!({}));
                        if let Some(token) = &rewrite_token {
                            request = request.query(&[("rewriteToken", token.as_str())]);
                        }
                        request
                    })
                    .await?;

                match response.status() {
                    StatusCode::OK => {}
                    StatusCode::NOT_FOUND => return Err(StorageError::not_found(src)),
                    status => return Err(Self::error_response("copy", status, response).await),
                }

                let rewrite: RewriteResponse = response.json().await?;
                if rewrite.done {
                    let obj = rewrite.resource.ok_or_else(|| {
                        StorageError::api("copy", 200, "rewrite finished without a resource")
                    })?;
                    return Ok(ObjectInfo::from(obj));
                }
                rewrite_token = rewrite.rewrite_token;
                if rewrite_token.is_none() {
                    return Err(StorageError::api("copy", 200, "rewrite incomplete without a token"));
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::CACHE_CONTROL_KEY;

    #[test]
    fn test_object_resource_splits_custom_metadata() {
        let metadata = ObjectMetadata::from([
            (CACHE_CONTROL_KEY.to_string(), serde_json::json!("public, max-age=86400")),
            ("a".to_string(), serde_json::json!(2)),
        ]);
        let (resource, content_type) = object_resource("dest/x.txt", &metadata);

        assert_eq!(content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(resource["name"], "dest/x.txt");
        assert_eq!(resource["cacheControl"], "public, max-age=86400");
        assert_eq!(resource["metadata"]["a"], "2");
    }

    #[test]
    fn test_multipart_body_layout() {
        let resource = serde_json::json!({"name": "k"});
        let (content_type, body) = multipart_body(&resource, "text/plain", b"hello");
        let boundary = content_type.trim_start_matches("multipart/related; boundary=");
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with(&format!("--{}\r\n", boundary)));
        assert!(text.contains("{\"name\":\"k\"}"));
        assert!(text.contains("Content-Type: text/plain\r\n\r\nhello\r\n"));
        assert!(text.ends_with(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn test_urls_encode_object_names() {
        let options = StorageOptions::new("my-bucket");
        let store = GcsStore::emulator(&options, "localhost:4443").unwrap();

        assert_eq!(
            store.object_url("dir/a b.txt"),
            "http://localhost:4443/storage/v1/b/my-bucket/o/dir%2Fa%20b.txt"
        );
        assert_eq!(
            store.rewrite_url("a/1", "b/2"),
            "http://localhost:4443/storage/v1/b/my-bucket/o/a%2F1/rewriteTo/b/my-bucket/o/b%2F2"
        );
    }

    #[test]
    fn test_gcs_object_conversion() {
        let obj: GcsObject = serde_json::from_value(serde_json::json!({
            "name": "k.txt",
            "size": "5",
            "contentType": "text/plain",
            "generation": "1700000000000000",
            "metadata": {"owner": "ops"}
        }))
        .unwrap();

        let info = ObjectInfo::from(obj);
        assert_eq!(info.size, 5);
        assert_eq!(info.metadata["owner"], "ops");
        assert!(info.cache_control.is_none());
    }
}
