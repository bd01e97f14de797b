//! Container files
//!
//! A container is one file holding any number of tables.
//!
//! ## Storage Format
//!
//! ```text
//! [4 bytes: "NTPL"][2 bytes: version][2 bytes: reserved]
//! [4 bytes: len][len bytes: postcard basket]...
//! [4 bytes: len][len bytes: postcard directory record]
//! [8 bytes: directory offset][4 bytes: "NTPL"]
//! ```
//!
//! Baskets are appended as tables fill. The directory record, listing every
//! table with its columns and basket index, is written once on close, followed
//! by the fixed trailer pointing at it. A file without a valid trailer cannot
//! be opened.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::directory::{ContainerId, Cwd, Selected};
use crate::error::StoreError;
use crate::table::{Table, TableId, TableMeta, TableOptions};

const MAGIC: [u8; 4] = *b"NTPL";
const VERSION: u16 = 1;
const HEADER_LEN: u64 = 8;
const TRAILER_LEN: u64 = 12;
/// Upper bound on a single record, guards length prefixes read from disk
pub(crate) const MAX_RECORD_LEN: u32 = 64 * 1024 * 1024;

pub(crate) type SharedBacking = Arc<Mutex<Backing>>;

/// How a container is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Open an existing container read-only
    Read,
    /// Create the file, truncating any existing content
    Recreate,
}

/// Options applied when creating a container
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    /// Whether to sync the file to disk on close
    pub sync_on_close: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            sync_on_close: true,
        }
    }
}

/// The open file behind a container
#[derive(Debug)]
pub(crate) struct Backing {
    path: PathBuf,
    file: File,
    writable: bool,
    /// End of the record region; next append position for writable files
    end: u64,
}

impl Backing {
    /// Append a length-prefixed record, returning its offset
    pub(crate) fn append_record(&mut self, payload: &[u8]) -> Result<u64, StoreError> {
        if !self.writable {
            return Err(StoreError::ReadOnly(self.path.display().to_string()));
        }
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|&len| len <= MAX_RECORD_LEN)
            .ok_or_else(|| StoreError::serialization("record too large"))?;

        let offset = self.end;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(payload)?;
        self.end = offset + 4 + u64::from(len);
        Ok(offset)
    }

    /// Read the record starting at `offset`
    pub(crate) fn read_record(&mut self, offset: u64) -> Result<Vec<u8>, StoreError> {
        if offset < HEADER_LEN || offset + 4 > self.end {
            return Err(StoreError::corrupt(format!(
                "record offset {offset} outside {}",
                self.path.display()
            )));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        let mut len_buf = [0u8; 4];
        self.file.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf);

        if len > MAX_RECORD_LEN || offset + 4 + u64::from(len) > self.end {
            return Err(StoreError::corrupt(format!(
                "invalid record length {len} at offset {offset}"
            )));
        }

        let mut payload = vec![0u8; len as usize];
        self.file.read_exact(&mut payload)?;
        Ok(payload)
    }
}

/// Top-level record listing the tables of a container
#[derive(Debug, Serialize, Deserialize)]
struct DirectoryRecord {
    created_millis: i64,
    tables: Vec<TableMeta>,
}

/// An open container file and the tables it holds
#[derive(Debug)]
pub struct Container {
    id: ContainerId,
    path: PathBuf,
    mode: Mode,
    options: ContainerOptions,
    backing: SharedBacking,
    created_millis: i64,
    tables: Vec<Table>,
}

impl Container {
    /// Open a container and make it the current one
    pub fn open(cwd: &mut Cwd<'_>, path: impl AsRef<Path>, mode: Mode) -> Result<Self, StoreError> {
        Self::open_with(cwd, path, mode, ContainerOptions::default())
    }

    /// Open a container with explicit options and make it the current one
    #[instrument(skip(cwd, path, options), fields(path = %path.as_ref().display()))]
    pub fn open_with(
        cwd: &mut Cwd<'_>,
        path: impl AsRef<Path>,
        mode: Mode,
        options: ContainerOptions,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let container = match mode {
            Mode::Read => Self::open_read(path, options)?,
            Mode::Recreate => Self::recreate(path, options)?,
        };
        cwd.select(container.selection());
        info!(id = %container.id, ?mode, tables = container.tables.len(), "Opened container");
        Ok(container)
    }

    fn open_read(path: PathBuf, options: ContainerOptions) -> Result<Self, StoreError> {
        let mut file = File::open(&path)?;
        let len = file.metadata()?.len();
        if len < HEADER_LEN + TRAILER_LEN {
            return Err(StoreError::not_a_container("file too short"));
        }

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        if header[..4] != MAGIC {
            return Err(StoreError::not_a_container("bad magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(StoreError::not_a_container(format!(
                "unsupported version {version}"
            )));
        }

        let records_end = len - TRAILER_LEN;
        file.seek(SeekFrom::Start(records_end))?;
        let mut trailer = [0u8; TRAILER_LEN as usize];
        file.read_exact(&mut trailer)?;
        if trailer[8..] != MAGIC {
            return Err(StoreError::not_a_container("missing trailer, file was not closed"));
        }
        let mut offset_buf = [0u8; 8];
        offset_buf.copy_from_slice(&trailer[..8]);
        let directory_offset = u64::from_le_bytes(offset_buf);

        let mut backing = Backing {
            path: path.clone(),
            file,
            writable: false,
            end: records_end,
        };
        let payload = backing.read_record(directory_offset)?;
        let record: DirectoryRecord = postcard::from_bytes(&payload)?;

        let tables = record.tables.into_iter().map(Table::from_meta).collect();

        Ok(Self {
            id: ContainerId::next(),
            path,
            mode: Mode::Read,
            options,
            backing: Arc::new(Mutex::new(backing)),
            created_millis: record.created_millis,
            tables,
        })
    }

    fn recreate(path: PathBuf, options: ContainerOptions) -> Result<Self, StoreError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut header = [0u8; HEADER_LEN as usize];
        header[..4].copy_from_slice(&MAGIC);
        header[4..6].copy_from_slice(&VERSION.to_le_bytes());
        file.write_all(&header)?;

        let backing = Backing {
            path: path.clone(),
            file,
            writable: true,
            end: HEADER_LEN,
        };

        Ok(Self {
            id: ContainerId::next(),
            path,
            mode: Mode::Recreate,
            options,
            backing: Arc::new(Mutex::new(backing)),
            created_millis: Utc::now().timestamp_millis(),
            tables: Vec::new(),
        })
    }

    #[cfg(test)]
    pub(crate) fn records_end(&self) -> u64 {
        self.backing.lock().end
    }

    pub(crate) fn selection(&self) -> Selected {
        Selected {
            id: self.id,
            backing: Arc::clone(&self.backing),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Creation time recorded in the container
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_millis).single()
    }

    /// Look up a table by name
    pub fn get(&self, name: &str) -> Option<TableId> {
        self.tables
            .iter()
            .position(|t| t.name() == name)
            .map(TableId)
    }

    /// Create a new, empty table
    pub fn create_table(
        &mut self,
        name: impl Into<String>,
        title: impl Into<String>,
        options: TableOptions,
    ) -> Result<TableId, StoreError> {
        if self.mode != Mode::Recreate {
            return Err(StoreError::ReadOnly(self.path.display().to_string()));
        }
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(StoreError::TableExists(name));
        }
        debug!(container = %self.id, table = %name, "Created table");
        self.tables.push(Table::new(name, title.into(), options));
        Ok(TableId(self.tables.len() - 1))
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0]
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Flush pending baskets, write the directory record and close the file
    ///
    /// Pending baskets go to the current container, so callers `cd` first.
    /// The container is deselected whether or not closing succeeds.
    pub fn close(mut self, cwd: &mut Cwd<'_>) -> Result<(), StoreError> {
        let result = self.finish(cwd);
        cwd.deselect(self.id);
        if result.is_ok() {
            info!(id = %self.id, path = %self.path.display(), "Closed container");
        }
        result
    }

    /// Flush every table and write the directory record and trailer
    fn finish(&mut self, cwd: &mut Cwd<'_>) -> Result<(), StoreError> {
        if self.mode == Mode::Recreate {
            for table in &mut self.tables {
                table.flush(cwd)?;
            }

            let record = DirectoryRecord {
                created_millis: self.created_millis,
                tables: self.tables.iter().map(Table::meta).collect(),
            };
            let payload = postcard::to_allocvec(&record)
                .map_err(|e| StoreError::serialization(e.to_string()))?;

            let mut backing = self.backing.lock();
            let offset = backing.append_record(&payload)?;
            let end = backing.end;
            backing.file.seek(SeekFrom::Start(end))?;
            backing.file.write_all(&offset.to_le_bytes())?;
            backing.file.write_all(&MAGIC)?;
            backing.file.flush()?;
            if self.options.sync_on_close {
                backing.file.sync_all()?;
            }
            backing.writable = false;
        }
        Ok(())
    }
}
