//! Error types for ntuple-store
//!
//! Every engine operation reports failure through [`StoreError`]. Callers at
//! the handle boundary convert these into their own outcome types.

use thiserror::Error;

use crate::column::ColumnType;

/// Errors that can occur in storage engine operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error on the container file
    #[error("I/O error: {0}")]
    Io(String),

    /// The container file is not a valid ntuple container
    #[error("Not a container: {0}")]
    NotAContainer(String),

    /// Stored data failed a checksum or consistency check
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The table has no column with this name
    #[error("No column named `{0}`")]
    NoSuchColumn(String),

    /// A column with this name was already declared
    #[error("Column `{0}` already exists")]
    ColumnExists(String),

    /// A table with this name was already created in the container
    #[error("Table `{0}` already exists")]
    TableExists(String),

    /// Column and slot (or stored data) disagree on the element type
    #[error("Type mismatch for column `{column}`: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    /// Column layout is not supported (e.g. an array of text)
    #[error("Unsupported column layout for `{0}`")]
    Unsupported(String),

    /// A column needed by the operation has no slot bound to it
    #[error("Column `{0}` is not bound to a slot")]
    Unbound(String),

    /// The caller's buffer has no slot for this id
    #[error("No slot {slot} in buffer for column `{column}`")]
    NoSuchSlot { column: String, slot: usize },

    /// The count column value does not fit the bound array slot
    #[error("Count {count} for column `{column}` exceeds slot capacity {capacity}")]
    CountExceedsCapacity {
        column: String,
        count: i32,
        capacity: usize,
    },

    /// No container is selected as the current directory
    #[error("No current directory selected")]
    NoCurrentDirectory,

    /// Attempted to write through a container opened read-only
    #[error("Container {0} is read-only")]
    ReadOnly(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Convert from postcard Error to StoreError
impl From<postcard::Error> for StoreError {
    fn from(err: postcard::Error) -> Self {
        StoreError::Deserialization(err.to_string())
    }
}

impl StoreError {
    /// Create a new Corrupt error
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }

    /// Create a new NotAContainer error
    pub fn not_a_container(message: impl Into<String>) -> Self {
        Self::NotAContainer(message.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }
}
