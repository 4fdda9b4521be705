//! Workspace sync coordinator: session tracking, per-module live
//! subscriptions, echo suppression and debounced persistence.
//!
//! [`WorkspaceSync::spawn`] starts the coordinator task and returns a
//! [`WorkspaceHandle`] through which UI code reads module state and submits
//! edits. Every edit flows through the coordinator; nothing writes to the
//! store directly.

pub mod config;
mod error;
pub mod handle;
pub mod identity;
pub mod module_sync;
pub mod paths;
pub mod persister;
mod runtime;
pub mod session;
pub mod subscriptions;
pub mod suppressor;

pub use config::{LoadGate, SyncConfig};
pub use error::SyncError;
pub use handle::{ModuleHandle, WorkspaceHandle};
pub use identity::{IdentityProvider, LocalIdentity};
pub use module_sync::ModuleSync;
pub use persister::WritePhase;
pub use runtime::{init_tracing, WorkspaceSync};
pub use session::{SessionState, Stage, View};
pub use subscriptions::SubscriptionTarget;
pub use suppressor::RemoteSuppressor;
