//! The ambient current directory
//!
//! The engine keeps one "current container" per [`Directory`]. Opening or
//! creating a container selects it, and full baskets are written to whatever
//! container is selected at the time, not necessarily the one owning the
//! table. Every operation that touches disk therefore takes a [`Cwd`], the
//! guard obtained from [`Directory::lock`], and callers re-select their own
//! container with [`Cwd::cd`] before issuing engine calls.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, MutexGuard};

use crate::container::{Container, SharedBacking};
use crate::error::StoreError;

static GLOBAL: LazyLock<Arc<Directory>> = LazyLock::new(|| Arc::new(Directory::new()));

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an open container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Selection state: which container the ambient directory points at
#[derive(Clone)]
pub(crate) struct Selected {
    pub(crate) id: ContainerId,
    pub(crate) backing: SharedBacking,
}

/// Mutex-protected selector of the current container
pub struct Directory {
    current: Mutex<Option<Selected>>,
}

impl Directory {
    /// Create an independent directory with nothing selected
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// The process-wide directory shared by all handles by default
    pub fn global() -> Arc<Directory> {
        Arc::clone(&GLOBAL)
    }

    /// Acquire exclusive access to the current selection
    ///
    /// Blocks until no other [`Cwd`] on this directory is alive.
    pub fn lock(&self) -> Cwd<'_> {
        Cwd {
            current: self.current.lock(),
        }
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory").finish_non_exhaustive()
    }
}

/// Exclusive access to a [`Directory`] selection
pub struct Cwd<'a> {
    current: MutexGuard<'a, Option<Selected>>,
}

impl Cwd<'_> {
    /// Make `container` the current one
    pub fn cd(&mut self, container: &Container) {
        *self.current = Some(container.selection());
    }

    /// The currently selected container, if any
    pub fn pwd(&self) -> Option<ContainerId> {
        self.current.as_ref().map(|s| s.id)
    }

    pub(crate) fn select(&mut self, selected: Selected) {
        *self.current = Some(selected);
    }

    /// Drop the selection if it points at `id`
    pub(crate) fn deselect(&mut self, id: ContainerId) {
        if self.pwd() == Some(id) {
            *self.current = None;
        }
    }

    pub(crate) fn backing(&self) -> Result<&SharedBacking, StoreError> {
        self.current
            .as_ref()
            .map(|s| &s.backing)
            .ok_or(StoreError::NoCurrentDirectory)
    }
}

impl fmt::Debug for Cwd<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cwd").field("pwd", &self.pwd()).finish()
    }
}
