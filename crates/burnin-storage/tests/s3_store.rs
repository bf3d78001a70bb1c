//! S3-compatible storage integration tests.

use burnin_models::StoragePath;
use burnin_storage::{ObjectStore, S3Store, StorageError};

#[tokio::test]
#[ignore = "requires S3-compatible storage"]
async fn test_write_then_read() {
    let store = S3Store::from_env().expect("Failed to create store");
    store.check_connectivity().await.expect("Storage unreachable");

    let path = StoragePath::parse("burnin-it/roundtrip.bin").unwrap();
    let url = store
        .write(&path, b"hello".to_vec(), "application/octet-stream")
        .await
        .expect("Failed to write");

    assert!(url.ends_with("burnin-it/roundtrip.bin"));
    assert_eq!(store.read(&path).await.unwrap(), b"hello");
}

#[tokio::test]
#[ignore = "requires S3-compatible storage"]
async fn test_missing_object() {
    let store = S3Store::from_env().expect("Failed to create store");

    let path = StoragePath::parse("burnin-it/does-not-exist.bin").unwrap();
    let err = store.read(&path).await.unwrap_err();

    assert!(matches!(err, StorageError::NotFound(_)));
}
