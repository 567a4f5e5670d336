//! Cloud Storage integration tests.
//!
//! Read `GCS_BUCKET_NAME` and credentials from the environment (or `.env`).

use gstash_storage::{CopyItem, ObjectMetadata, StorageClient};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("gstash_storage=debug")
        .with_test_writer()
        .try_init();
}

fn test_prefix() -> String {
    format!("gstash-it/{}/", uuid::Uuid::new_v4().simple())
}

/// Test upload, download and prefix delete round trip.
#[tokio::test]
#[ignore = "requires GCS credentials"]
async fn test_bucket_round_trip() {
    dotenvy::dotenv().ok();
    init_tracing();

    let client = StorageClient::from_env()
        .await
        .expect("Failed to create storage client");

    let prefix = test_prefix();
    let key = format!("{}hello.txt", prefix);

    client
        .upload_data(b"hello", &key, &ObjectMetadata::new())
        .await
        .expect("Failed to upload");
    assert!(client.exists(&key).await.unwrap());

    let bytes = client.download_object(&key).await.unwrap();
    assert_eq!(bytes, Some(b"hello".to_vec()));

    let copy_key = format!("{}copy.txt", prefix);
    client
        .copy(&[CopyItem::new(key.clone(), copy_key.clone())])
        .await
        .expect("Failed to copy");

    let deleted = client.delete_by_prefix(&prefix).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(!client.exists(&copy_key).await.unwrap());
}

/// Test folder upload layout.
#[tokio::test]
#[ignore = "requires GCS credentials"]
async fn test_upload_folder() {
    dotenvy::dotenv().ok();
    init_tracing();

    let client = StorageClient::from_env()
        .await
        .expect("Failed to create storage client");

    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("x.txt"), b"x").unwrap();
    std::fs::create_dir(root.path().join("sub")).unwrap();
    std::fs::write(root.path().join("sub").join("y.txt"), b"y").unwrap();

    let prefix = test_prefix();
    let uploaded = client.upload_folder(root.path(), &prefix).await.unwrap();
    assert_eq!(uploaded.len(), 2);

    let mut keys: Vec<_> = client
        .list(&prefix)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key)
        .collect();
    keys.sort();
    assert_eq!(
        keys,
        vec![format!("{}sub/y.txt", prefix), format!("{}x.txt", prefix)]
    );

    client.delete_by_prefix(&prefix).await.unwrap();
}
