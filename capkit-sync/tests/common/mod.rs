#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use capkit_core::{AuthUser, Document, DocumentPath, ModuleName, UserId};
use capkit_store::MemoryStore;
use capkit_sync::{LocalIdentity, SyncConfig, SyncError, WorkspaceHandle, WorkspaceSync};

/// Long enough for any pending debounce timer to fire under the default
/// configuration.
pub const PAST_DEBOUNCE: Duration = Duration::from_millis(2000);

pub struct Harness {
    pub store: MemoryStore,
    pub identity: Arc<LocalIdentity>,
    pub handle: WorkspaceHandle,
    pub task: JoinHandle<Result<(), SyncError>>,
}

impl Harness {
    pub async fn start(store: MemoryStore, identity: LocalIdentity, config: SyncConfig) -> Self {
        let identity = Arc::new(identity);
        let signed_in = identity.current().is_some();
        let (handle, task) =
            WorkspaceSync::spawn(Arc::new(store.clone()), identity.clone(), config)
                .expect("spawn coordinator");
        if signed_in {
            handle.wait_until_loaded().await.expect("loaded");
        }
        settle().await;
        Self {
            store,
            identity,
            handle,
            task,
        }
    }

    /// Signed in as `uid` against an empty store with default config.
    pub async fn signed_in(uid: &str) -> Self {
        Self::start(
            MemoryStore::new(),
            LocalIdentity::signed_in(AuthUser::new(uid)),
            SyncConfig::default(),
        )
        .await
    }

    pub fn module_writes(&self, uid: &str, module: ModuleName) -> Vec<Document> {
        self.store.writes_to(&module_path(uid, module))
    }
}

pub fn module_path(uid: &str, module: ModuleName) -> DocumentPath {
    DocumentPath::module(&UserId::from(uid), module)
}

pub fn profile_path(uid: &str) -> DocumentPath {
    DocumentPath::profile(&UserId::from(uid))
}

pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Let the coordinator drain everything that is already queued.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
