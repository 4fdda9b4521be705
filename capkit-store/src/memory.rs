//! In-process document store.
//!
//! Besides implementing [`DocumentStore`], `MemoryStore` keeps a journal of
//! every merge-write it accepted and lets callers change documents "from
//! another device" ([`MemoryStore::put_external`]) without touching the
//! journal. Paths can be denied and writes switched to failing, which makes
//! it the store of choice for exercising the coordinator's error paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;

use capkit_core::document::merge_write;
use capkit_core::{Document, DocumentPath};

use crate::error::StoreError;
use crate::store::{DocumentStore, Snapshot, SnapshotResult, Subscription, SubscriptionGuard};

/// A merge-write accepted by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub path: DocumentPath,
    pub patch: Document,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<DocumentPath, Document>,
    listeners: HashMap<DocumentPath, Vec<Listener>>,
    next_listener: u64,
    journal: Vec<WriteRecord>,
    denied: HashSet<DocumentPath>,
    held: HashSet<DocumentPath>,
    failing_writes: bool,
}

struct Listener {
    id: u64,
    tx: mpsc::UnboundedSender<SnapshotResult>,
}

impl Inner {
    fn snapshot(&self, path: &DocumentPath) -> SnapshotResult {
        if self.denied.contains(path) {
            return Err(StoreError::PermissionDenied {
                path: path.to_string(),
            });
        }
        Ok(Snapshot {
            path: path.clone(),
            document: self.documents.get(path).cloned(),
        })
    }

    fn notify(&mut self, path: &DocumentPath) {
        if self.held.contains(path) {
            return;
        }
        let Some(listeners) = self.listeners.get(path) else {
            return;
        };
        let mut closed = Vec::new();
        for listener in listeners {
            if listener.tx.send(self.snapshot(path)).is_err() {
                closed.push(listener.id);
            }
        }
        if !closed.is_empty() {
            self.remove_listeners(path, &closed);
        }
    }

    fn remove_listeners(&mut self, path: &DocumentPath, ids: &[u64]) {
        if let Some(listeners) = self.listeners.get_mut(path) {
            listeners.retain(|l| !ids.contains(&l.id));
            if listeners.is_empty() {
                self.listeners.remove(path);
            }
        }
    }
}

/// Cheap to clone; clones share the same documents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace a document as if another client wrote it. Notifies
    /// subscribers; not recorded in the journal.
    pub fn put_external(&self, path: &DocumentPath, document: Document) {
        let mut inner = self.lock();
        inner.documents.insert(path.clone(), document);
        inner.notify(path);
    }

    /// Delete a document as if another client removed it.
    pub fn remove_external(&self, path: &DocumentPath) {
        let mut inner = self.lock();
        if inner.documents.remove(path).is_some() {
            inner.notify(path);
        }
    }

    /// Current stored value, bypassing permissions.
    pub fn document(&self, path: &DocumentPath) -> Option<Document> {
        self.lock().documents.get(path).cloned()
    }

    /// Deny reads, writes and subscriptions on `path`. Open subscriptions
    /// receive a permission error.
    pub fn deny(&self, path: &DocumentPath) {
        let mut inner = self.lock();
        inner.denied.insert(path.clone());
        inner.notify(path);
    }

    /// Lift a [`deny`](Self::deny). Open subscriptions receive the current
    /// document.
    pub fn allow(&self, path: &DocumentPath) {
        let mut inner = self.lock();
        if inner.denied.remove(path) {
            inner.notify(path);
        }
    }

    /// Withhold deliveries on `path`, including the initial snapshot of new
    /// subscriptions, until [`release`](Self::release).
    pub fn hold(&self, path: &DocumentPath) {
        self.lock().held.insert(path.clone());
    }

    /// Deliver the current state of `path` to every listener and stop
    /// withholding.
    pub fn release(&self, path: &DocumentPath) {
        let mut inner = self.lock();
        if inner.held.remove(path) {
            inner.notify(path);
        }
    }

    /// Make every `set_merge` fail with [`StoreError::Unavailable`].
    pub fn set_failing_writes(&self, failing: bool) {
        self.lock().failing_writes = failing;
    }

    /// Every accepted merge-write, oldest first.
    pub fn journal(&self) -> Vec<WriteRecord> {
        self.lock().journal.clone()
    }

    /// Patches written to `path`, oldest first.
    pub fn writes_to(&self, path: &DocumentPath) -> Vec<Document> {
        self.lock()
            .journal
            .iter()
            .filter(|w| &w.path == path)
            .map(|w| w.patch.clone())
            .collect()
    }

    /// Number of live listeners on `path`.
    pub fn subscriber_count(&self, path: &DocumentPath) -> usize {
        self.lock().listeners.get(path).map_or(0, Vec::len)
    }

    /// Number of live listeners across all documents.
    pub fn total_subscribers(&self) -> usize {
        self.lock().listeners.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn subscribe(&self, path: &DocumentPath) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;

        if !inner.held.contains(path) {
            let _ = tx.send(inner.snapshot(path));
        }
        inner
            .listeners
            .entry(path.clone())
            .or_default()
            .push(Listener { id, tx });
        drop(inner);

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let path = path.clone();
        Subscription::new(
            rx,
            SubscriptionGuard::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove_listeners(&path, &[id]);
                }
            }),
        )
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        self.lock().snapshot(path).map(|s| s.document)
    }

    async fn set_merge(&self, path: &DocumentPath, patch: Document) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.failing_writes {
            return Err(StoreError::Unavailable("writes are disabled".to_string()));
        }
        if inner.denied.contains(path) {
            return Err(StoreError::PermissionDenied {
                path: path.to_string(),
            });
        }

        merge_write(
            inner.documents.entry(path.clone()).or_default(),
            patch.clone(),
        );
        inner.journal.push(WriteRecord {
            path: path.clone(),
            patch,
        });
        inner.notify(path);
        tracing::debug!(path = %path, "memory store merge-write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn subscribe_delivers_current_state_first() {
        let store = MemoryStore::new();
        let path = DocumentPath::from("users/u1");
        let mut sub = store.subscribe(&path);

        let first = sub.next().await.expect("delivery").expect("snapshot");
        assert!(!first.exists());

        store
            .set_merge(&path, doc(json!({"name": "Ana"})))
            .await
            .expect("write");
        let second = sub.next().await.expect("delivery").expect("snapshot");
        assert_eq!(second.document, Some(doc(json!({"name": "Ana"}))));
    }

    #[tokio::test]
    async fn dropping_the_subscription_unregisters_the_listener() {
        let store = MemoryStore::new();
        let path = DocumentPath::from("users/u1");
        let sub = store.subscribe(&path);
        assert_eq!(store.subscriber_count(&path), 1);

        drop(sub);
        assert_eq!(store.subscriber_count(&path), 0);
    }

    #[tokio::test]
    async fn external_writes_skip_the_journal() {
        let store = MemoryStore::new();
        let path = DocumentPath::from("workspaces/u1/modules/canvas");
        store.put_external(&path, doc(json!({"Problem": "Z"})));
        assert!(store.journal().is_empty());
        assert_eq!(store.document(&path), Some(doc(json!({"Problem": "Z"}))));
    }

    #[tokio::test]
    async fn set_merge_merges_into_existing_document() {
        let store = MemoryStore::new();
        let path = DocumentPath::from("users/u1");
        store.put_external(&path, doc(json!({"name": "Ana", "email": "a@x.io"})));
        store
            .set_merge(&path, doc(json!({"name": "Ann"})))
            .await
            .expect("write");
        assert_eq!(
            store.document(&path),
            Some(doc(json!({"name": "Ann", "email": "a@x.io"})))
        );
    }

    #[tokio::test]
    async fn denied_paths_reject_writes_and_error_subscriptions() {
        let store = MemoryStore::new();
        let path = DocumentPath::from("users/u1");
        store.deny(&path);

        let err = store.set_merge(&path, Document::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));

        let mut sub = store.subscribe(&path);
        assert!(sub.next().await.expect("delivery").is_err());

        store.allow(&path);
        assert!(sub.next().await.expect("delivery").is_ok());
    }

    #[tokio::test]
    async fn held_paths_deliver_on_release() {
        let store = MemoryStore::new();
        let path = DocumentPath::from("users/u1");
        store.hold(&path);
        let mut sub = store.subscribe(&path);
        store.put_external(&path, doc(json!({"name": "Ana"})));
        store.put_external(&path, doc(json!({"name": "Ann"})));

        store.release(&path);
        let snapshot = sub.next().await.expect("delivery").expect("snapshot");
        assert_eq!(snapshot.document, Some(doc(json!({"name": "Ann"}))));

        let mut receiver = sub.into_parts().0;
        assert!(receiver.try_recv().is_err(), "only the latest state is delivered");
    }

    #[tokio::test]
    async fn failing_writes_are_not_journaled() {
        let store = MemoryStore::new();
        store.set_failing_writes(true);
        let err = store
            .set_merge(&DocumentPath::from("users/u1"), Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.journal().is_empty());
    }
}
