//! Reading events from ntuple files

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ntuple_store::{Container, Directory, Mode, TableId};
use tracing::{debug, info, instrument, warn};

use crate::buffer::EventBuffer;
use crate::config::NtupleConfig;
use crate::error::{CreateError, ReadError};
use crate::event::{Event, EventView, MAX_NPARTICLE, MAX_NWGT};
use crate::guard::{FileGuard, abandon, catch_fault};
use crate::schema::{self, BindMode, BoundColumns, Generation};

/// An open ntuple file, read entry by entry
///
/// As an [`Iterator`] a reader yields every entry from its current
/// [`position`](Reader::position) to the end; an entry that fails validation
/// is yielded as an error and iteration moves on.
#[derive(Debug)]
pub struct Reader {
    directory: Arc<Directory>,
    container: Option<Container>,
    table: TableId,
    generation: Generation,
    bound: BoundColumns,
    buffer: Box<EventBuffer>,
    entries: u64,
    position: u64,
    path: PathBuf,
}

impl Reader {
    /// Open `path` using the process-wide directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CreateError> {
        Self::open_with(path, &NtupleConfig::default())
    }

    /// Open `path` with explicit configuration
    #[instrument(skip(path, config), fields(path = %path.as_ref().display()))]
    pub fn open_with(path: impl AsRef<Path>, config: &NtupleConfig) -> Result<Self, CreateError> {
        let path = path.as_ref();
        let directory = Arc::clone(&config.directory);
        catch_fault("open", || Self::open_inner(directory, path))
            .map_err(|_| CreateError::Exception)?
    }

    fn open_inner(directory: Arc<Directory>, path: &Path) -> Result<Self, CreateError> {
        let (container, table, generation, bound, buffer) = {
            let mut cwd = directory.lock();
            let mut container =
                Container::open(&mut cwd, path, Mode::Read).map_err(|e| CreateError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;

            let found = Generation::LOOKUP_ORDER
                .iter()
                .find_map(|&g| container.get(g.table_name()).map(|t| (g, t)));
            let Some((generation, table)) = found else {
                abandon(container, &mut cwd);
                return Err(CreateError::NoTable);
            };

            let mut buffer = Box::new(EventBuffer::new());
            buffer.terminate_part();

            match schema::bind(container.table_mut(table), generation, BindMode::Attach) {
                Ok(bound) => (container, table, generation, bound, buffer),
                Err(e) => {
                    abandon(container, &mut cwd);
                    return Err(e.into());
                }
            }
        };

        let entries = container.table(table).entries();
        info!(
            path = %path.display(),
            ?generation,
            table = generation.table_name(),
            entries,
            "Opened ntuple for reading"
        );

        Ok(Self {
            directory,
            container: Some(container),
            table,
            generation,
            bound,
            buffer,
            entries,
            position: 0,
            path: path.to_path_buf(),
        })
    }

    /// Number of entries in the file, or -1 on a fault
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

    /// Load entry `index` and borrow it from the reader's buffer
    ///
    /// Returns `Ok(None)` past the end of the data. The view stays valid
    /// until the next read.
    pub fn read_view(&mut self, index: i64) -> Result<Option<EventView<'_>>, ReadError> {
        let loaded = catch_fault("read", || self.load(index)).map_err(|_| ReadError::Exception)??;
        if !loaded {
            return Ok(None);
        }
        Ok(Some(self.buffer.view(self.generation)))
    }

    /// Load entry `index` as an owned [`Event`]
    pub fn read(&mut self, index: i64) -> Result<Option<Event>, ReadError> {
        Ok(self.read_view(index)?.map(Event::from))
    }

    /// Load into the buffer under the guard, then check the loaded counts
    fn load(&mut self, index: i64) -> Result<bool, ReadError> {
        let container = self.container.as_mut().ok_or(ReadError::Exception)?;
        let mut guard = FileGuard::acquire(&self.directory, container);

        let loaded = container
            .table_mut(self.table)
            .get_entry(guard.cwd(), index, self.buffer.as_mut());
        match loaded {
            Ok(None) => Ok(false),
            Ok(Some(_)) => {
                validate_loaded(&self.buffer)?;
                Ok(true)
            }
            Err(e) => {
                warn!(path = %self.path.display(), index, error = %e, "Failed to load entry");
                Err(ReadError::ReadFailed(e.to_string()))
            }
        }
    }

    /// Index of the entry the iterator yields next
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the iterator to entry `index`
    pub fn seek(&mut self, index: u64) {
        self.position = index;
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Title of the event table
    pub fn title(&self) -> &str {
        self.container
            .as_ref()
            .map(|c| c.table(self.table).title())
            .unwrap_or_default()
    }

    /// When the file was created, if it records a valid time
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.container.as_ref().and_then(Container::created_at)
    }

    pub fn bound_columns(&self) -> &BoundColumns {
        &self.bound
    }

    /// Close the file
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
            Ok(Ok(())) => debug!(path = %self.path.display(), "Closed reader"),
            Ok(Err(e)) => warn!(path = %self.path.display(), error = %e, "Ignoring error while closing reader"),
            Err(_) => warn!(path = %self.path.display(), "Ignoring fault while closing reader"),
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Check loaded counts before they size any view
fn validate_loaded(buffer: &EventBuffer) -> Result<(), ReadError> {
    let nparticle = buffer.nparticle();
    if nparticle < 0 {
        return Err(ReadError::NegParticleNum(nparticle));
    }
    if nparticle as usize > MAX_NPARTICLE {
        return Err(ReadError::TooManyParticles(nparticle));
    }
    let nuwgt = buffer.nuwgt();
    if nuwgt < 0 {
        return Err(ReadError::NegWeightNum(nuwgt));
    }
    if nuwgt as usize > MAX_NWGT {
        return Err(ReadError::TooManyWeights(nuwgt));
    }
    Ok(())
}

impl Iterator for Reader {
    type Item = Result<Event, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.entries {
            return None;
        }
        let index = self.position;
        self.position += 1;
        let index = i64::try_from(index).ok()?;
        self.read(index).transpose()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.entries.saturating_sub(self.position)).unwrap_or(usize::MAX);
        (left, Some(left))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.position = self.position.saturating_add(n as u64);
        self.next()
    }

    fn last(mut self) -> Option<Self::Item> {
        if self.position >= self.entries {
            return None;
        }
        self.position = self.entries - 1;
        self.next()
    }
}

impl ExactSizeIterator for Reader {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_loaded_order() {
        let mut buffer = EventBuffer::new();
        buffer.nparticle = -1;
        buffer.nuwgt = -1;
        assert_eq!(validate_loaded(&buffer), Err(ReadError::NegParticleNum(-1)));

        buffer.nparticle = 101;
        assert_eq!(validate_loaded(&buffer), Err(ReadError::TooManyParticles(101)));

        buffer.nparticle = 100;
        assert_eq!(validate_loaded(&buffer), Err(ReadError::NegWeightNum(-1)));

        buffer.nuwgt = 101;
        assert_eq!(validate_loaded(&buffer), Err(ReadError::TooManyWeights(101)));

        buffer.nuwgt = 100;
        assert_eq!(validate_loaded(&buffer), Ok(()));
    }
}
