//! JSON-file document store.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   users/<uid>.json
//!   workspaces/<uid>/modules/<module>.json
//! ```
//!
//! Writes read the current file, merge the patch, write `<file>.json.tmp`
//! and rename it over the original. Subscriptions watch the document's
//! parent directory and re-read the file on every create/modify/remove,
//! skipping deliveries whose content did not change.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use capkit_core::document::merge_write;
use capkit_core::{Document, DocumentPath};

use crate::error::{io_err, StoreError};
use crate::store::{DocumentStore, Snapshot, SnapshotResult, Subscription, SubscriptionGuard};

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<segments...>.json`. Pure, no I/O.
    pub fn file_path(&self, path: &DocumentPath) -> Result<PathBuf, StoreError> {
        let segments: Vec<&str> = path.segments().collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(StoreError::InvalidPath(path.to_string()));
        };
        if segments
            .iter()
            .any(|s| *s == "." || *s == ".." || s.contains('\\'))
        {
            return Err(StoreError::InvalidPath(path.to_string()));
        }

        let mut file = self.root.clone();
        for segment in parents {
            file.push(segment);
        }
        file.push(format!("{last}.json"));
        Ok(file)
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    fn subscribe(&self, path: &DocumentPath) -> Subscription {
        let file = match self.file_path(path) {
            Ok(file) => file,
            Err(err) => return Subscription::failed(err),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let watch = Arc::new(DocumentWatch {
            path: path.clone(),
            file,
            tx,
            last: Mutex::new(None),
        });

        match start_watcher(watch.clone()) {
            Ok(watcher) => {
                // Watcher first, then the initial read, so no change slips between.
                watch.refresh();
                Subscription::new(rx, SubscriptionGuard::new(move || drop(watcher)))
            }
            Err(err) => {
                let _ = watch.tx.send(Err(err));
                Subscription::new(rx, SubscriptionGuard::noop())
            }
        }
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let file = self.file_path(path)?;
        tokio::task::spawn_blocking(move || read_document(&file))
            .await
            .map_err(|err| StoreError::Unavailable(format!("read task join error: {err}")))?
    }

    async fn set_merge(&self, path: &DocumentPath, patch: Document) -> Result<(), StoreError> {
        let file = self.file_path(path)?;
        let _guard = self.write_lock.lock().await;
        tokio::task::spawn_blocking(move || {
            let mut document = read_document(&file)?.unwrap_or_default();
            merge_write(&mut document, patch);
            write_document(&file, &document)
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("write task join error: {err}")))??;
        tracing::debug!(path = %path, "file store merge-write");
        Ok(())
    }
}

/// Load a document file. Returns `None` if it does not exist.
pub fn read_document(file: &Path) -> Result<Option<Document>, StoreError> {
    let contents = match std::fs::read_to_string(file) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(file, err)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: file.to_path_buf(),
            source,
        })
}

/// Save a document file atomically (`<file>.json.tmp` + rename).
pub fn write_document(file: &Path, document: &Document) -> Result<(), StoreError> {
    let Some(dir) = file.parent() else {
        return Err(io_err(
            file,
            std::io::Error::other("invalid document file path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(document)?;
    let tmp = file.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, file) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(file, e));
    }
    Ok(())
}

struct DocumentWatch {
    path: DocumentPath,
    file: PathBuf,
    tx: mpsc::UnboundedSender<SnapshotResult>,
    /// Last delivered content; `None` until the first delivery.
    last: Mutex<Option<Option<Document>>>,
}

impl DocumentWatch {
    fn refresh(&self) {
        let document = match read_document(&self.file) {
            Ok(document) => document,
            Err(err) => {
                let _ = self.tx.send(Err(err));
                return;
            }
        };

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_ref() == Some(&document) {
            return;
        }
        *last = Some(document.clone());
        let _ = self.tx.send(Ok(Snapshot {
            path: self.path.clone(),
            document,
        }));
    }

    fn concerns(&self, event: &Event) -> bool {
        matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) && event
            .paths
            .iter()
            .any(|p| p.file_name() == self.file.file_name())
    }
}

fn start_watcher(watch: Arc<DocumentWatch>) -> Result<RecommendedWatcher, StoreError> {
    let dir = watch
        .file
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| StoreError::InvalidPath(watch.path.to_string()))?;
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let callback_watch = watch.clone();
    let mut watcher = recommended_watcher(move |event: notify::Result<Event>| match event {
        Ok(event) => {
            if callback_watch.concerns(&event) {
                callback_watch.refresh();
            }
        }
        Err(err) => {
            tracing::warn!(path = %callback_watch.path, error = %err, "document watcher error");
            let _ = callback_watch.tx.send(Err(StoreError::Notify(err)));
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::debug!(path = %watch.path, dir = %dir.display(), "watching document directory");
    Ok(watcher)
}
