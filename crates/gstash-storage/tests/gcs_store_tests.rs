//! Cloud Storage backend tests against a mocked JSON API endpoint.

use gstash_storage::{
    CopyItem, GcsStore, ObjectMetadata, ObjectStore, StorageClient, StorageError, StorageOptions,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUCKET: &str = "test-bucket";

fn options(server: &MockServer, staging: &std::path::Path) -> StorageOptions {
    let mut options = StorageOptions::new(BUCKET).with_staging_dir(staging);
    options.emulator_host = Some(server.uri());
    options.key_filename = Some("unused-key.json".into());
    options
}

fn object(name: &str, size: usize) -> serde_json::Value {
    json!({
        "name": name,
        "bucket": BUCKET,
        "size": size.to_string(),
        "generation": "1",
        "cacheControl": "public, max-age=86400"
    })
}

#[tokio::test]
async fn test_upload_data_sends_multipart_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/upload/storage/v1/b/{}/o", BUCKET)))
        .and(query_param("uploadType", "multipart"))
        .and(body_string_contains("public, max-age=86400"))
        .and(body_string_contains("hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object("k.txt", 5)))
        .expect(1)
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let client = StorageClient::new(options(&server, staging.path())).await.unwrap();

    let info = client
        .upload_data(b"hello", "k.txt", &ObjectMetadata::new())
        .await
        .unwrap();

    assert_eq!(info.key, "k.txt");
    assert_eq!(info.size, 5);
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_failure_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/upload/storage/v1/b/{}/o", BUCKET)))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let client = StorageClient::new(options(&server, staging.path())).await.unwrap();

    let err = client
        .upload_data(b"hello", "k.txt", &ObjectMetadata::new())
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Api { status: 403, .. }));
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_download_object_missing_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/{}/o/absent.txt", BUCKET)))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/{}/o/present.txt", BUCKET)))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_string("here"))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let store = GcsStore::emulator(&options(&server, staging.path()), &server.uri()).unwrap();

    assert_eq!(store.download("absent.txt").await.unwrap(), None);
    assert_eq!(
        store.download("present.txt").await.unwrap(),
        Some(b"here".to_vec())
    );
}

#[tokio::test]
async fn test_list_follows_page_tokens() {
    let server = MockServer::start().await;
    let list_path = format!("/storage/v1/b/{}/o", BUCKET);

    Mock::given(method("GET"))
        .and(path(list_path.clone()))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [object("dest/c.txt", 3)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(list_path))
        .and(query_param("prefix", "dest/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [object("dest/a.txt", 1), object("dest/b.txt", 2)],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let client = StorageClient::new(options(&server, staging.path())).await.unwrap();

    let keys: Vec<_> = client
        .list("dest/")
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(keys, vec!["dest/a.txt", "dest/b.txt", "dest/c.txt"]);
}

#[tokio::test]
async fn test_delete_by_prefix_deletes_listed_objects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/{}/o", BUCKET)))
        .and(query_param("prefix", "dest/sub/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [object("dest/sub/y.txt", 1), object("dest/sub/z.txt", 1)]
        })))
        .mount(&server)
        .await;
    for name in ["dest%2Fsub%2Fy.txt", "dest%2Fsub%2Fz.txt"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/storage/v1/b/{}/o/{}", BUCKET, name)))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }

    let staging = tempfile::tempdir().unwrap();
    let client = StorageClient::new(options(&server, staging.path())).await.unwrap();

    assert_eq!(client.delete_by_prefix("dest/sub/").await.unwrap(), 2);
}

#[tokio::test]
async fn test_copy_continues_rewrite_until_done() {
    let server = MockServer::start().await;
    let rewrite_path = format!("/storage/v1/b/{0}/o/a.txt/rewriteTo/b/{0}/o/b.txt", BUCKET);

    Mock::given(method("POST"))
        .and(path(rewrite_path.clone()))
        .and(query_param("rewriteToken", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "done": true,
            "resource": object("b.txt", 10)
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(rewrite_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "done": false,
            "rewriteToken": "next"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let client = StorageClient::new(options(&server, staging.path())).await.unwrap();

    let copied = client.copy(&[CopyItem::new("a.txt", "b.txt")]).await.unwrap();
    assert_eq!(copied.len(), 1);
    assert_eq!(copied[0].key, "b.txt");
    assert_eq!(copied[0].size, 10);
}

#[tokio::test]
async fn test_copy_missing_source_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let client = StorageClient::new(options(&server, staging.path())).await.unwrap();

    let err = client
        .copy(&[CopyItem::new("missing.txt", "b.txt")])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn test_construction_fails_without_credentials() {
    let server = MockServer::start().await;
    let staging = tempfile::tempdir().unwrap();
    let mut options = options(&server, staging.path());
    options.key_filename = None;

    let err = StorageClient::new(options).await.err().unwrap();
    assert!(err.is_configuration());
    assert_eq!(
        err.to_string(),
        "Failed to configure storage client: credentials not found in storage options"
    );
}
