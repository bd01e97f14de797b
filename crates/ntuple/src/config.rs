//! Handle configuration

use std::sync::Arc;

use ntuple_store::Directory;

/// Options for opening readers and creating writers
#[derive(Debug, Clone)]
pub struct NtupleConfig {
    /// Directory whose current selection the handle shares
    pub directory: Arc<Directory>,
    /// Entries per basket for new tables
    pub basket_entries: usize,
    /// Whether writers sync the file to disk on close
    pub sync_on_close: bool,
}

impl Default for NtupleConfig {
    fn default() -> Self {
        Self {
            directory: Directory::global(),
            basket_entries: 1000,
            sync_on_close: true,
        }
    }
}

impl NtupleConfig {
    /// Use a private directory instead of the process-wide one
    pub fn with_directory(mut self, directory: Arc<Directory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_basket_entries(mut self, entries: usize) -> Self {
        self.basket_entries = entries.max(1);
        self
    }

    pub fn with_sync_on_close(mut self, sync: bool) -> Self {
        self.sync_on_close = sync;
        self
    }
}
