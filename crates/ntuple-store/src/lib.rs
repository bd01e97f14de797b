//! # ntuple-store
//!
//! Column-oriented container files for event ntuples.
//!
//! A [`Container`] is one file holding named [`Table`]s. Each table is a set
//! of typed columns; array columns take their per-entry length from a scalar
//! count column. Callers bind columns to locations in their own buffer (any
//! type implementing [`Slots`]), then fill or load one entry at a time.
//!
//! ## The current directory
//!
//! Like the storage engines it mirrors, this one keeps an ambient "current
//! container" per [`Directory`]. Opening a container selects it, and full
//! baskets are written to whichever container is selected. All disk-touching
//! calls therefore take a [`Cwd`] lock guard, and callers must [`Cwd::cd`] to
//! their own container before filling, loading or closing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ntuple_store::{ColumnDesc, ColumnType, Container, Directory, Mode, SlotId, TableOptions};
//!
//! let directory = Directory::global();
//! let mut cwd = directory.lock();
//! let mut container = Container::open(&mut cwd, "out.ntpl", Mode::Recreate)?;
//! let table = container.create_table("events", "my events", TableOptions::default())?;
//! container
//!     .table_mut(table)
//!     .branch(ColumnDesc::scalar("id", ColumnType::Int), SlotId(0))?;
//! // ... fill rows from a `Slots` buffer ...
//! container.close(&mut cwd)?;
//! ```

pub mod column;
pub mod container;
pub mod directory;
pub mod error;
pub mod table;

// Re-exports
pub use column::{ColumnData, ColumnDesc, ColumnType, Slot, SlotId, SlotMut, Slots};
pub use container::{Container, ContainerOptions, Mode};
pub use directory::{ContainerId, Cwd, Directory};
pub use error::StoreError;
pub use table::{BasketLocation, ColumnId, MAX_BASKET_BYTES, Table, TableId, TableOptions};
