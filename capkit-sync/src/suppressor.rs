//! Remote-update suppression.
//!
//! Remembers, per module, whether the most recent change to its local
//! mirror came from the store. When the debounce timer fires for a module
//! whose last change was remote, the write is skipped: the store already
//! holds that value (usually it is the echo of this session's own write).

use std::collections::HashMap;

use capkit_core::ModuleName;

#[derive(Debug, Default)]
pub struct RemoteSuppressor {
    flags: HashMap<ModuleName, bool>,
}

impl RemoteSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_remote(&mut self, module: ModuleName) {
        self.flags.insert(module, true);
    }

    /// A genuine local edit supersedes a pending remote marker.
    pub fn mark_local(&mut self, module: ModuleName) {
        self.flags.insert(module, false);
    }

    /// Returns whether the last change was remote, resetting the flag.
    pub fn consume_if_remote(&mut self, module: ModuleName) -> bool {
        self.flags
            .get_mut(&module)
            .map(std::mem::take)
            .unwrap_or(false)
    }

    pub fn is_marked(&self, module: ModuleName) -> bool {
        self.flags.get(&module).copied().unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.flags.clear();
    }
}
