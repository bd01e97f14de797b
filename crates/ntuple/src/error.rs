//! Outcome types at the handle boundary
//!
//! Engine errors never cross this boundary as-is; each handle operation maps
//! them (and any caught panic) onto one of the enums below.

use std::path::PathBuf;

use ntuple_store::ColumnType;
use thiserror::Error;

/// Failure to bind the event columns of a table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The table has no column with this name
    #[error("missing column `{0}`")]
    MissingColumn(String),

    /// The column exists with a different on-disk type
    #[error("column `{column}` has type {found:?}, expected {expected:?}")]
    WrongType {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    /// The column is scalar where an array is expected, or keyed to the wrong count
    #[error("column `{column}` is not laid out as {expected}")]
    WrongLayout { column: String, expected: String },

    /// Declaring a column on a new table failed
    #[error("cannot declare column `{column}`: {reason}")]
    Declare { column: String, reason: String },
}

/// Failure to open or create a handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    /// The container could not be opened or created
    #[error("failed to open {}: {reason}", path.display())]
    OpenFailed { path: PathBuf, reason: String },

    /// No event table of a known generation was found
    #[error("no event table found")]
    NoTable,

    /// The event table is missing a column or has one of the wrong type
    #[error("column binding failed: {0}")]
    Bind(#[from] BindError),

    /// Unexpected internal fault
    #[error("unexpected fault while opening")]
    Exception,
}

/// Read outcomes other than success and end-of-data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("too many particles: {0}")]
    TooManyParticles(i32),

    #[error("too many user weights: {0}")]
    TooManyWeights(i32),

    #[error("negative particle count: {0}")]
    NegParticleNum(i32),

    #[error("negative user weight count: {0}")]
    NegWeightNum(i32),

    /// The storage engine failed to load the entry
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// Unexpected internal fault
    #[error("unexpected fault while reading")]
    Exception,
}

/// Write outcomes other than success
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("negative particle count: {0}")]
    NegParticleNum(i32),

    #[error("negative user weight count: {0}")]
    NegWeightNum(i32),

    #[error("too many particles: {0}")]
    TooManyParticles(i32),

    #[error("too many user weights: {0}")]
    TooManyWeights(i32),

    /// An array field does not hold exactly as many entries as its count
    #[error("`{field}` has {len} entries, count says {expected}")]
    LengthMismatch {
        field: &'static str,
        len: usize,
        expected: usize,
    },

    /// The storage engine rejected the entry
    #[error("fill failed: {0}")]
    FillError(String),

    /// Unexpected internal fault
    #[error("unexpected fault while writing")]
    Exception,
}
