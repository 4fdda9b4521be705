//! Coordinator configuration, optionally loaded from `~/.capkit/config.yaml`.
//!
//! ```yaml
//! debounce_ms: 1500
//! load_gate: subscriptions_issued   # or first_snapshot
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};
use crate::paths::config_path;

/// Quiet period before a module edit is persisted.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(1500);

/// When a module is allowed to start persisting local changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadGate {
    /// As soon as every subscription has been issued, before any data has
    /// arrived. An edit made before the module's first delivery can
    /// overwrite a slow-arriving remote value.
    #[default]
    SubscriptionsIssued,
    /// Only after the module's own subscription delivered once.
    FirstSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub debounce_ms: u64,
    pub load_gate: LoadGate,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEBOUNCE_WINDOW.as_millis() as u64,
            load_gate: LoadGate::default(),
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = debounce.as_millis() as u64;
        self
    }

    pub fn with_load_gate(mut self, load_gate: LoadGate) -> Self {
        self.load_gate = load_gate;
        self
    }

    /// Load `<home>/.capkit/config.yaml`; defaults when the file is absent.
    pub fn load_at(home: &Path) -> Result<Self, SyncError> {
        let path = config_path(home);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(io_err(&path, err)),
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| SyncError::Config { path, source })
    }

    pub fn to_yaml(&self) -> Result<String, SyncError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
