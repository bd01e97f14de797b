//! Serialized access to the ambient current container
//!
//! The storage engine writes full baskets to whichever container is current,
//! and that selection is shared by every handle on a [`Directory`]. A
//! [`FileGuard`] holds the directory lock and re-selects the handle's own
//! container, so selection and I/O happen as one critical section.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use ntuple_store::{Container, Cwd, Directory};
use tracing::{error, warn};

/// Directory lock with a handle's container selected
#[derive(Debug)]
pub struct FileGuard<'a> {
    cwd: Cwd<'a>,
}

impl<'a> FileGuard<'a> {
    /// Lock `directory`, then make `container` current
    pub fn acquire(directory: &'a Directory, container: &Container) -> Self {
        let mut cwd = directory.lock();
        cwd.cd(container);
        Self { cwd }
    }

    pub fn cwd(&mut self) -> &mut Cwd<'a> {
        &mut self.cwd
    }
}

/// Close a container whose handle was never built
///
/// Used on failed open and create paths, where the original error is the one
/// reported; a close failure is only logged.
pub(crate) fn abandon(container: Container, cwd: &mut Cwd<'_>) {
    let path = container.path().to_path_buf();
    if let Err(e) = container.close(cwd) {
        warn!(path = %path.display(), error = %e, "Ignoring error while abandoning container");
    }
}

/// A panic caught at the handle boundary
#[derive(Debug, Clone)]
pub struct Fault {
    pub operation: &'static str,
    pub message: String,
}

/// Run `f`, turning a panic into a [`Fault`]
///
/// The directory lock is a non-poisoning mutex, so a panic while it is held
/// leaves it usable for other handles.
pub fn catch_fault<T>(operation: &'static str, f: impl FnOnce() -> T) -> Result<T, Fault> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        error!(operation, %message, "Caught fault at handle boundary");
        Fault { operation, message }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
