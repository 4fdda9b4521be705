//! The store contract: live per-document subscriptions plus merge-writes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use capkit_core::{Document, DocumentPath};

use crate::error::StoreError;

/// One delivery on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocumentPath,
    /// `None` when the document does not exist.
    pub document: Option<Document>,
}

impl Snapshot {
    pub fn exists(&self) -> bool {
        self.document.is_some()
    }
}

/// Deliveries carry errors in-stream; an error does not end the stream.
pub type SnapshotResult = Result<Snapshot, StoreError>;

/// Remote document store.
///
/// `subscribe` delivers the current state of the document immediately, then
/// one snapshot per change, until the returned [`Subscription`] (or its
/// [`SubscriptionGuard`]) is dropped.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    fn subscribe(&self, path: &DocumentPath) -> Subscription;

    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError>;

    /// Merge `patch` into the stored document, creating it if absent.
    async fn set_merge(&self, path: &DocumentPath, patch: Document) -> Result<(), StoreError>;
}

/// Receiving end of a live document subscription.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<SnapshotResult>,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<SnapshotResult>, guard: SubscriptionGuard) -> Self {
        Self { receiver, guard }
    }

    /// A subscription whose only delivery is `error`.
    pub fn failed(error: StoreError) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Err(error));
        Self::new(rx, SubscriptionGuard::noop())
    }

    pub async fn next(&mut self) -> Option<SnapshotResult> {
        self.receiver.recv().await
    }

    /// Split into the delivery stream and the guard that keeps the listener
    /// registered. Dropping the guard unsubscribes synchronously.
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<SnapshotResult>, SubscriptionGuard) {
        (self.receiver, self.guard)
    }
}

/// Unsubscribes when dropped.
pub struct SubscriptionGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn noop() -> Self {
        Self { cancel: None }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
