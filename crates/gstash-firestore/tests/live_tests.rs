//! Firestore integration tests.

use std::collections::HashMap;

use gstash_firestore::{FirestoreClient, ToFirestoreValue};

/// Test document CRUD through handles.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_document_crud() {
    dotenvy::dotenv().ok();

    let client = FirestoreClient::from_env()
        .await
        .expect("Failed to create Firestore client");

    let doc = client.document("_gstash_it", "crud");

    let fields = HashMap::from([
        ("label".to_string(), "integration".to_firestore_value()),
        ("count".to_string(), 1i64.to_firestore_value()),
    ]);
    doc.set(fields).await.expect("Failed to set document");

    let updates = HashMap::from([("count".to_string(), 2i64.to_firestore_value())]);
    doc.update(updates).await.expect("Failed to update document");

    let read = doc.get().await.unwrap().expect("Document should exist");
    assert_eq!(read.get::<i64>("count"), Some(2));
    assert_eq!(read.get::<String>("label").as_deref(), Some("integration"));

    doc.delete().await.expect("Failed to delete document");
    assert!(doc.get().await.unwrap().is_none());
}
