//! # capkit-store
//!
//! The document store seam used by the workspace sync coordinator.
//!
//! [`DocumentStore`] offers per-document live subscriptions and merge-writes.
//! Two implementations ship with the crate: [`MemoryStore`] (in-process,
//! with a write journal) and [`FileStore`] (one JSON file per document,
//! live updates via filesystem notifications).

pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::{MemoryStore, WriteRecord};
pub use store::{DocumentStore, Snapshot, SnapshotResult, Subscription, SubscriptionGuard};
