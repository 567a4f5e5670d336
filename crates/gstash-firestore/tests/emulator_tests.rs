//! Firestore client tests against a mocked REST endpoint.

use std::collections::HashMap;

use gstash_firestore::{FirestoreClient, FirestoreError, FirestoreOptions, ToFirestoreValue, Value};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";

async fn client(server: &MockServer) -> FirestoreClient {
    let mut options = FirestoreOptions::new("demo", "svc@demo.iam.gserviceaccount.com", "key");
    options.emulator_host = Some(server.uri());
    FirestoreClient::new(options)
        .await
        .expect("Failed to create Firestore client")
}

fn user_doc(id: &str, credits: i64) -> serde_json::Value {
    json!({
        "name": format!("projects/demo/databases/(default)/documents/users/{}", id),
        "fields": {
            "email": {"stringValue": format!("{}@example.com", id)},
            "credits": {"integerValue": credits.to_string()}
        },
        "createTime": "2024-05-01T12:00:00Z",
        "updateTime": "2024-05-01T12:00:00Z"
    })
}

#[tokio::test]
async fn test_get_existing_and_missing_documents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/u1", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_doc("u1", 10)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/u2", DOCS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server).await;

    let doc = client.document("users", "u1").get().await.unwrap().unwrap();
    assert_eq!(doc.id(), Some("u1"));
    assert_eq!(doc.get::<i64>("credits"), Some(10));

    assert!(client.document("users", "u2").get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_replaces_document() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/users/u1", DOCS)))
        .and(body_partial_json(json!({
            "fields": {"credits": {"integerValue": "5"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_doc("u1", 5)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let fields = HashMap::from([("credits".to_string(), 5i64.to_firestore_value())]);

    let doc = client.collection("users").doc("u1").set(fields).await.unwrap();
    assert_eq!(doc.get::<i64>("credits"), Some(5));
}

#[tokio::test]
async fn test_update_sends_mask_and_precondition() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/users/u1", DOCS)))
        .and(query_param("updateMask.fieldPaths", "credits"))
        .and(query_param("currentDocument.exists", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_doc("u1", 7)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/users/ghost", DOCS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server).await;
    let fields = HashMap::from([("credits".to_string(), Value::IntegerValue("7".to_string()))]);

    let doc = client.document("users", "u1").update(fields.clone()).await.unwrap();
    assert_eq!(doc.get::<String>("email").as_deref(), Some("u1@example.com"));

    let err = client.document("users", "ghost").update(fields).await.unwrap_err();
    assert!(matches!(err, FirestoreError::NotFound(_)));
}

#[tokio::test]
async fn test_create_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/users", DOCS)))
        .and(query_param("documentId", "u1"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let client = client(&server).await;
    let err = client
        .document("users", "u1")
        .create(HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FirestoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/users/gone", DOCS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server).await;
    client.document("users", "gone").delete().await.unwrap();
}

#[tokio::test]
async fn test_list_collects_all_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users", DOCS)))
        .and(query_param("pageToken", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [user_doc("u3", 3)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [user_doc("u1", 1), user_doc("u2", 2)],
            "nextPageToken": "next"
        })))
        .mount(&server)
        .await;

    let client = client(&server).await;
    let docs = client.collection("users").list().await.unwrap();

    let ids: Vec<_> = docs.iter().filter_map(|d| d.id()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3"]);
}

#[tokio::test]
async fn test_server_error_maps_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = client(&server).await;
    let err = client.document("users", "u1").get().await.unwrap_err();
    assert_eq!(err.http_status(), Some(503));
}

#[tokio::test]
async fn test_collection_and_document_segments_are_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/team%20docs/a%2Fb", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_doc("a", 1)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/team%20docs", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [user_doc("a", 1)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let collection = client.collection("team docs");

    assert!(collection.doc("a/b").get().await.unwrap().is_some());
    assert_eq!(collection.list().await.unwrap().len(), 1);
}
