//! Event table layouts and column binding
//!
//! Two generations of the layout exist. They share every column name and type
//! except `alphasPower`, a 16-bit integer in current files and a single byte
//! in legacy ones. Two weight columns keep a misspelled on-disk label
//! (`me_wtg`, `me_wtg2`); columns are keyed by name, so the label is cosmetic.

use ntuple_store::{ColumnDesc, ColumnType, StoreError, Table};
use tracing::debug;

use crate::buffer::Field;
use crate::error::BindError;

/// On-disk layout generation of an event table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    Current,
    Legacy,
}

impl Generation {
    /// Order in which readers look for an event table
    pub const LOOKUP_ORDER: [Generation; 2] = [Generation::Current, Generation::Legacy];

    pub fn table_name(self) -> &'static str {
        match self {
            Generation::Current => "BHSntuples",
            Generation::Legacy => "t3",
        }
    }

    pub fn alphas_power_type(self) -> ColumnType {
        match self {
            Generation::Current => ColumnType::Short,
            Generation::Legacy => ColumnType::Byte,
        }
    }

    fn alphas_power_field(self) -> Field {
        match self {
            Generation::Current => Field::AlphasPower,
            Generation::Legacy => Field::AlphasPowerLegacy,
        }
    }
}

/// One event column: its name, label, type and buffer field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub field: Field,
    pub name: &'static str,
    pub label: &'static str,
    pub ty: ColumnType,
    pub count: Option<&'static str>,
}

impl ColumnSpec {
    const fn scalar(field: Field, name: &'static str, ty: ColumnType) -> Self {
        Self {
            field,
            name,
            label: name,
            ty,
            count: None,
        }
    }

    const fn array(field: Field, name: &'static str, ty: ColumnType, count: &'static str) -> Self {
        Self {
            field,
            name,
            label: name,
            ty,
            count: Some(count),
        }
    }

    const fn labelled(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn desc(&self) -> ColumnDesc {
        let desc = match self.count {
            Some(count) => ColumnDesc::array(self.name, self.ty, count),
            None => ColumnDesc::scalar(self.name, self.ty),
        };
        desc.with_label(self.label)
    }
}

/// The event columns of `generation`, in declaration order
pub fn columns(generation: Generation) -> [ColumnSpec; 24] {
    use ColumnType::*;
    [
        ColumnSpec::scalar(Field::Id, "id", Int),
        ColumnSpec::scalar(Field::NParticle, "nparticle", Int),
        ColumnSpec::array(Field::Px, "px", Float, "nparticle"),
        ColumnSpec::array(Field::Py, "py", Float, "nparticle"),
        ColumnSpec::array(Field::Pz, "pz", Float, "nparticle"),
        ColumnSpec::array(Field::Energy, "E", Float, "nparticle"),
        ColumnSpec::scalar(Field::Alphas, "alphas", Double),
        ColumnSpec::array(Field::PdgCode, "kf", Int, "nparticle"),
        ColumnSpec::scalar(Field::Weight, "weight", Double),
        ColumnSpec::scalar(Field::Weight2, "weight2", Double),
        ColumnSpec::scalar(Field::MeWeight, "me_wgt", Double).labelled("me_wtg"),
        ColumnSpec::scalar(Field::MeWeight2, "me_wgt2", Double).labelled("me_wtg2"),
        ColumnSpec::scalar(Field::X1, "x1", Double),
        ColumnSpec::scalar(Field::X2, "x2", Double),
        ColumnSpec::scalar(Field::X1p, "x1p", Double),
        ColumnSpec::scalar(Field::X2p, "x2p", Double),
        ColumnSpec::scalar(Field::Id1, "id1", Int),
        ColumnSpec::scalar(Field::Id2, "id2", Int),
        ColumnSpec::scalar(Field::FacScale, "fac_scale", Double),
        ColumnSpec::scalar(Field::RenScale, "ren_scale", Double),
        ColumnSpec::scalar(Field::NUserWeights, "nuwgt", Int),
        ColumnSpec::array(Field::UserWeights, "usr_wgts", Double, "nuwgt"),
        ColumnSpec::scalar(Field::Part, "part", Char),
        ColumnSpec::scalar(
            generation.alphas_power_field(),
            "alphasPower",
            generation.alphas_power_type(),
        ),
    ]
}

/// Whether binding declares new columns or attaches to existing ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Writers: declare each column on an empty table
    Declare,
    /// Readers: bind each existing column
    Attach,
}

/// The columns of a table bound to an event buffer
#[derive(Debug, Clone)]
pub struct BoundColumns {
    generation: Generation,
    columns: Vec<ColumnSpec>,
}

impl BoundColumns {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Bind every event column of `table` to its [`EventBuffer`](crate::buffer::EventBuffer) slot
///
/// Must be called once per table. Stops at the first column that cannot be
/// bound.
pub fn bind(
    table: &mut Table,
    generation: Generation,
    mode: BindMode,
) -> Result<BoundColumns, BindError> {
    let specs = columns(generation);
    for spec in &specs {
        match mode {
            BindMode::Declare => declare(table, spec)?,
            BindMode::Attach => attach(table, spec)?,
        }
    }
    debug!(
        table = %table.name(),
        ?generation,
        ?mode,
        columns = specs.len(),
        "Bound event columns"
    );
    Ok(BoundColumns {
        generation,
        columns: specs.to_vec(),
    })
}

fn declare(table: &mut Table, spec: &ColumnSpec) -> Result<(), BindError> {
    table
        .branch(spec.desc(), spec.field.slot())
        .map(|_| ())
        .map_err(|e| BindError::Declare {
            column: spec.name.to_string(),
            reason: e.to_string(),
        })
}

fn attach(table: &mut Table, spec: &ColumnSpec) -> Result<(), BindError> {
    let (_, desc) = table
        .column(spec.name)
        .ok_or_else(|| BindError::MissingColumn(spec.name.to_string()))?;
    if desc.count.as_deref() != spec.count {
        let expected = match spec.count {
            Some(count) => format!("an array keyed to `{count}`"),
            None => "a scalar".to_string(),
        };
        return Err(BindError::WrongLayout {
            column: spec.name.to_string(),
            expected,
        });
    }

    table
        .set_branch_address(spec.name, spec.ty, spec.field.slot())
        .map(|_| ())
        .map_err(|e| match e {
            StoreError::NoSuchColumn(column) => BindError::MissingColumn(column),
            // the engine reports the stored type as expected, the requested one as found
            StoreError::TypeMismatch {
                column,
                expected,
                found,
            } => BindError::WrongType {
                column,
                expected: found,
                found: expected,
            },
            other => BindError::Declare {
                column: spec.name.to_string(),
                reason: other.to_string(),
            },
        })
}
