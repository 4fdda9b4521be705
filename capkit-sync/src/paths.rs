use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yaml";

pub fn capkit_root(home: &Path) -> PathBuf {
    home.join(".capkit")
}

/// Root of the bundled file-backed document store.
pub fn store_root(home: &Path) -> PathBuf {
    capkit_root(home).join("store")
}

pub fn config_path(home: &Path) -> PathBuf {
    capkit_root(home).join(CONFIG_FILE)
}
