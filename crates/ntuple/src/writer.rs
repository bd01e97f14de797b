//! Writing events to ntuple files

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ntuple_store::{Container, ContainerOptions, Directory, Mode, TableId, TableOptions};
use tracing::{debug, info, instrument, trace, warn};

use crate::buffer::EventBuffer;
use crate::config::NtupleConfig;
use crate::error::{CreateError, WriteError};
use crate::event::{Event, MAX_NPARTICLE, MAX_NWGT};
use crate::guard::{FileGuard, abandon, catch_fault};
use crate::schema::{self, BindMode, BoundColumns, Generation};

/// A new ntuple file, filled one event at a time
///
/// Writers always produce the current layout. Data is only complete once the
/// writer is closed, explicitly or by dropping it.
#[derive(Debug)]
pub struct Writer {
    directory: Arc<Directory>,
    container: Option<Container>,
    table: TableId,
    bound: BoundColumns,
    buffer: Box<EventBuffer>,
    path: PathBuf,
}

impl Writer {
    /// Create (or truncate) `path` using the process-wide directory
    pub fn create(path: impl AsRef<Path>, title: &str) -> Result<Self, CreateError> {
        Self::create_with(path, title, &NtupleConfig::default())
    }

    /// Create (or truncate) `path` with explicit configuration
    #[instrument(skip(path, config), fields(path = %path.as_ref().display()))]
    pub fn create_with(
        path: impl AsRef<Path>,
        title: &str,
        config: &NtupleConfig,
    ) -> Result<Self, CreateError> {
        let path = path.as_ref();
        catch_fault("create", || Self::create_inner(path, title, config))
            .map_err(|_| CreateError::Exception)?
    }

    fn create_inner(path: &Path, title: &str, config: &NtupleConfig) -> Result<Self, CreateError> {
        let directory = Arc::clone(&config.directory);
        let (container, table, bound, buffer) = {
            let mut cwd = directory.lock();
            let options = ContainerOptions {
                sync_on_close: config.sync_on_close,
            };
            let mut container = Container::open_with(&mut cwd, path, Mode::Recreate, options)
                .map_err(|e| CreateError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;

            let table_options = TableOptions::default().with_basket_entries(config.basket_entries);
            let table = match container.create_table(
                Generation::Current.table_name(),
                title,
                table_options,
            ) {
                Ok(table) => table,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to create event table");
                    abandon(container, &mut cwd);
                    return Err(CreateError::NoTable);
                }
            };

            let mut buffer = Box::new(EventBuffer::new());
            buffer.terminate_part();

            match schema::bind(container.table_mut(table), Generation::Current, BindMode::Declare) {
                Ok(bound) => (container, table, bound, buffer),
                Err(e) => {
                    abandon(container, &mut cwd);
                    return Err(e.into());
                }
            }
        };

        info!(path = %path.display(), title, "Created ntuple for writing");
        Ok(Self {
            directory,
            container: Some(container),
            table,
            bound,
            buffer,
            path: path.to_path_buf(),
        })
    }

    /// Append `event` as a new entry
    ///
    /// Counts and array lengths are checked before anything is copied; a
    /// rejected event leaves the file untouched.
    pub fn write(&mut self, event: &Event) -> Result<(), WriteError> {
        catch_fault("write", || self.write_inner(event)).map_err(|_| WriteError::Exception)?
    }

    fn write_inner(&mut self, event: &Event) -> Result<(), WriteError> {
        validate(event)?;
        self.buffer.store(event);

        let container = self.container.as_mut().ok_or(WriteError::Exception)?;
        let mut guard = FileGuard::acquire(&self.directory, container);
        let entry = container
            .table_mut(self.table)
            .fill(guard.cwd(), self.buffer.as_ref())
            .map_err(|e| {
                warn!(path = %self.path.display(), error = %e, "Failed to fill event");
                WriteError::FillError(e.to_string())
            })?;
        trace!(entry, id = event.id, "Wrote event");
        Ok(())
    }

    /// Number of entries written so far, or -1 on a fault
    pub fn event_count(&self) -> i64 {
        let Some(container) = &self.container else {
            return -1;
        };
        catch_fault("event_count", || {
            let _guard = FileGuard::acquire(&self.directory, container);
            i64::try_from(container.table(self.table).entries()).unwrap_or(-1)
        })
        .unwrap_or(-1)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bound_columns(&self) -> &BoundColumns {
        &self.bound
    }

    /// Flush pending entries and close the file
    ///
    /// Never fails; faults while closing are logged and swallowed.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(container) = self.container.take() else {
            return;
        };
        let directory = &self.directory;
        let result = catch_fault("close", || {
            let mut guard = FileGuard::acquire(directory, &container);
            container.close(guard.cwd())
        });
        match result {
            Ok(Ok(())) => debug!(path = %self.path.display(), "Closed writer"),
            Ok(Err(e)) => warn!(path = %self.path.display(), error = %e, "Ignoring error while closing writer"),
            Err(_) => warn!(path = %self.path.display(), "Ignoring fault while closing writer"),
        }
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn validate(event: &Event) -> Result<(), WriteError> {
    if event.nparticle < 0 {
        return Err(WriteError::NegParticleNum(event.nparticle));
    }
    if event.nuwgt < 0 {
        return Err(WriteError::NegWeightNum(event.nuwgt));
    }
    if event.nparticle as usize > MAX_NPARTICLE {
        return Err(WriteError::TooManyParticles(event.nparticle));
    }
    if event.nuwgt as usize > MAX_NWGT {
        return Err(WriteError::TooManyWeights(event.nuwgt));
    }

    let n = event.nparticle as usize;
    let lengths = [
        ("px", event.px.len()),
        ("py", event.py.len()),
        ("pz", event.pz.len()),
        ("energy", event.energy.len()),
        ("pdg_code", event.pdg_code.len()),
    ];
    for (field, len) in lengths {
        if len != n {
            return Err(WriteError::LengthMismatch {
                field,
                len,
                expected: n,
            });
        }
    }
    let w = event.nuwgt as usize;
    if event.user_weights.len() != w {
        return Err(WriteError::LengthMismatch {
            field: "user_weights",
            len: event.user_weights.len(),
            expected: w,
        });
    }
    Ok(())
}
