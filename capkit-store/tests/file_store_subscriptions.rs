//! Live subscription behaviour of `FileStore` against a real filesystem.

use std::time::Duration;

use capkit_core::{Document, DocumentPath};
use capkit_store::{DocumentStore, FileStore, Snapshot, Subscription};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::timeout;

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

async fn next_snapshot(sub: &mut Subscription) -> Snapshot {
    timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("delivery within 5s")
        .expect("stream open")
        .expect("snapshot")
}

/// Wait until a delivery matches `expected`; watchers may report
/// intermediate states of the same write.
async fn wait_for_document(sub: &mut Subscription, expected: Option<Document>) {
    loop {
        let snapshot = next_snapshot(sub).await;
        if snapshot.document == expected {
            return;
        }
    }
}

#[tokio::test]
async fn subscription_starts_with_missing_document() {
    let tmp = TempDir::new().expect("tempdir");
    let store = FileStore::new(tmp.path());
    let mut sub = store.subscribe(&DocumentPath::from("workspaces/u1/modules/canvas"));

    let first = next_snapshot(&mut sub).await;
    assert!(!first.exists());
    assert_eq!(first.path.as_str(), "workspaces/u1/modules/canvas");
}

#[tokio::test]
async fn subscription_sees_merge_writes() {
    let tmp = TempDir::new().expect("tempdir");
    let store = FileStore::new(tmp.path());
    let path = DocumentPath::from("workspaces/u1/modules/canvas");
    let mut sub = store.subscribe(&path);
    assert!(!next_snapshot(&mut sub).await.exists());

    store
        .set_merge(&path, doc(json!({"Problem": "X"})))
        .await
        .expect("write");
    wait_for_document(&mut sub, Some(doc(json!({"Problem": "X"})))).await;

    store
        .set_merge(&path, doc(json!({"Solution": "Y"})))
        .await
        .expect("write");
    wait_for_document(
        &mut sub,
        Some(doc(json!({"Problem": "X", "Solution": "Y"}))),
    )
    .await;
}

#[tokio::test]
async fn subscription_reports_existing_document_immediately() {
    let tmp = TempDir::new().expect("tempdir");
    let store = FileStore::new(tmp.path());
    let path = DocumentPath::from("users/u1");
    store
        .set_merge(&path, doc(json!({"name": "Ana"})))
        .await
        .expect("write");

    let mut sub = store.subscribe(&path);
    let first = next_snapshot(&mut sub).await;
    assert_eq!(first.document, Some(doc(json!({"name": "Ana"}))));
}

#[tokio::test]
async fn invalid_path_subscription_delivers_an_error() {
    let tmp = TempDir::new().expect("tempdir");
    let store = FileStore::new(tmp.path());
    let mut sub = store.subscribe(&DocumentPath::from("../escape"));
    let delivery = timeout(Duration::from_secs(1), sub.next())
        .await
        .expect("delivery")
        .expect("stream open");
    assert!(delivery.is_err());
}
