use std::path::PathBuf;

use thiserror::Error;

use capkit_core::ModuleName;

/// Error surface for the coordinator, its handles and its configuration.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store error: {0}")]
    Store(#[from] capkit_store::StoreError),

    #[error("document error: {0}")]
    Core(#[from] capkit_core::CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("value does not match the payload type of module '{module}'")]
    ModuleType { module: ModuleName },

    #[error("identity provider error: {0}")]
    Identity(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
