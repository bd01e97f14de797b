//! # ntuple
//!
//! Read and write physics event ntuples.
//!
//! An [`Event`] carries particle kinematics, PDF information and weights.
//! [`Writer`] appends events to a new file; [`Reader`] opens files in either
//! the current layout or the legacy one (which stores `alphasPower` as a
//! single byte) and validates every loaded entry before exposing it.
//!
//! Every handle operation reports failure as a typed result. Engine errors
//! and panics are caught at the handle boundary; closing never fails.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ntuple::{Event, Reader, Writer};
//!
//! let mut writer = Writer::create("events.ntpl", "my run")?;
//! let mut event = Event::default();
//! event.push_particle(21, [100.0, 0.0, 0.0, 100.0]);
//! writer.write(&event)?;
//! writer.close();
//!
//! let mut reader = Reader::open("events.ntpl")?;
//! assert_eq!(reader.event_count(), 1);
//! for event in reader {
//!     println!("{:?}", event?);
//! }
//! ```
//!
//! ## Features
//!
//! - `hepmc2`: conversions between [`Event`] and `hepmc2::Event` (see
//!   `conv`).
//!
//! ## Threads
//!
//! Handles on different files may be used from different threads. All disk
//! access goes through one directory lock (see [`guard`]), so I/O across
//! handles is serialized.

pub mod buffer;
pub mod config;
#[cfg(feature = "hepmc2")]
pub mod conv;
pub mod error;
pub mod event;
pub mod guard;
pub mod reader;
pub mod schema;
pub mod writer;

// Re-exports
pub use buffer::{EventBuffer, Field};
pub use config::NtupleConfig;
pub use error::{BindError, CreateError, ReadError, WriteError};
pub use event::{Event, EventView, MAX_NPARTICLE, MAX_NWGT, Part};
pub use reader::Reader;
pub use schema::{BindMode, BoundColumns, ColumnSpec, Generation};
pub use writer::Writer;
