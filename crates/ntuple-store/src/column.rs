//! Column types, descriptors and caller-side slots
//!
//! A table binds each of its columns to a [`SlotId`]. At fill and load time
//! the engine asks the caller's [`Slots`] implementation for a typed view of
//! that slot, which is how a column is associated with caller memory.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Element type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 32-bit signed integer
    Int,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// 16-bit signed integer
    Short,
    /// 8-bit signed integer
    Byte,
    /// NUL-terminated short text
    Char,
}

impl ColumnType {
    /// Single-letter type code used in leaf specs
    pub fn code(self) -> char {
        match self {
            ColumnType::Int => 'I',
            ColumnType::Float => 'F',
            ColumnType::Double => 'D',
            ColumnType::Short => 'S',
            ColumnType::Byte => 'B',
            ColumnType::Char => 'C',
        }
    }
}

/// Declaration of one column in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDesc {
    /// Column name, the key columns are looked up by
    pub name: String,
    /// On-disk leaf label
    pub label: String,
    /// Element type
    pub ty: ColumnType,
    /// Name of the count column governing the per-entry length, for arrays
    pub count: Option<String>,
}

impl ColumnDesc {
    /// A scalar column whose label equals its name
    pub fn scalar(name: impl Into<String>, ty: ColumnType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            ty,
            count: None,
        }
    }

    /// A variable-length array column governed by `count`
    pub fn array(name: impl Into<String>, ty: ColumnType, count: impl Into<String>) -> Self {
        Self {
            count: Some(count.into()),
            ..Self::scalar(name, ty)
        }
    }

    /// Override the on-disk label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Whether this column holds a variable-length array per entry
    pub fn is_array(&self) -> bool {
        self.count.is_some()
    }

    /// Leaf spec in `label[count]/T` notation
    pub fn leaf_spec(&self) -> String {
        match &self.count {
            Some(count) => format!("{}[{}]/{}", self.label, count, self.ty.code()),
            None => format!("{}/{}", self.label, self.ty.code()),
        }
    }
}

/// Identifies a location in the caller's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub usize);

/// Read-only typed view of a buffer slot
#[derive(Debug)]
pub enum Slot<'a> {
    Int(&'a i32),
    Float(&'a f32),
    Double(&'a f64),
    Short(&'a i16),
    Byte(&'a i8),
    /// Text slot; content ends at the first NUL byte
    Char(&'a [u8]),
    IntArray(&'a [i32]),
    FloatArray(&'a [f32]),
    DoubleArray(&'a [f64]),
}

/// Mutable typed view of a buffer slot
#[derive(Debug)]
pub enum SlotMut<'a> {
    Int(&'a mut i32),
    Float(&'a mut f32),
    Double(&'a mut f64),
    Short(&'a mut i16),
    Byte(&'a mut i8),
    Char(&'a mut [u8]),
    IntArray(&'a mut [i32]),
    FloatArray(&'a mut [f32]),
    DoubleArray(&'a mut [f64]),
}

impl Slot<'_> {
    /// Element type of the slot
    pub fn ty(&self) -> ColumnType {
        match self {
            Slot::Int(_) | Slot::IntArray(_) => ColumnType::Int,
            Slot::Float(_) | Slot::FloatArray(_) => ColumnType::Float,
            Slot::Double(_) | Slot::DoubleArray(_) => ColumnType::Double,
            Slot::Short(_) => ColumnType::Short,
            Slot::Byte(_) => ColumnType::Byte,
            Slot::Char(_) => ColumnType::Char,
        }
    }

    /// Whether the slot is an array slot
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Slot::IntArray(_) | Slot::FloatArray(_) | Slot::DoubleArray(_)
        )
    }

    /// Upper bound on the encoded size of the first `n` elements
    pub(crate) fn encoded_bound(&self, n: usize) -> usize {
        // varint widths: i32 up to 5 bytes, i16 up to 3
        match self {
            Slot::Int(_) => 5,
            Slot::Float(_) => 4,
            Slot::Double(_) => 8,
            Slot::Short(_) => 3,
            Slot::Byte(_) => 1,
            Slot::Char(bytes) => bytes.len() + 5,
            Slot::IntArray(_) => 5 * n,
            Slot::FloatArray(_) => 4 * n,
            Slot::DoubleArray(_) => 8 * n,
        }
    }
}

impl SlotMut<'_> {
    /// Element type of the slot
    pub fn ty(&self) -> ColumnType {
        match self {
            SlotMut::Int(_) | SlotMut::IntArray(_) => ColumnType::Int,
            SlotMut::Float(_) | SlotMut::FloatArray(_) => ColumnType::Float,
            SlotMut::Double(_) | SlotMut::DoubleArray(_) => ColumnType::Double,
            SlotMut::Short(_) => ColumnType::Short,
            SlotMut::Byte(_) => ColumnType::Byte,
            SlotMut::Char(_) => ColumnType::Char,
        }
    }
}

/// A caller-owned buffer the engine fills from and loads into
///
/// Array slots are always handed out at full capacity. The number of
/// elements actually written or read per entry is decided by the engine from
/// the bound count column.
pub trait Slots {
    /// Typed view of a slot, `None` if the buffer has no such slot
    fn slot(&self, id: SlotId) -> Option<Slot<'_>>;

    /// Mutable typed view of a slot, `None` if the buffer has no such slot
    fn slot_mut(&mut self, id: SlotId) -> Option<SlotMut<'_>>;
}

/// Column values of one basket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Short(Vec<i16>),
    Byte(Vec<i8>),
    Char(Vec<Vec<u8>>),
}

impl ColumnData {
    /// Empty storage for a column of the given type
    pub fn new(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Int => ColumnData::Int(Vec::new()),
            ColumnType::Float => ColumnData::Float(Vec::new()),
            ColumnType::Double => ColumnData::Double(Vec::new()),
            ColumnType::Short => ColumnData::Short(Vec::new()),
            ColumnType::Byte => ColumnData::Byte(Vec::new()),
            ColumnType::Char => ColumnData::Char(Vec::new()),
        }
    }

    /// Element type of the stored values
    pub fn ty(&self) -> ColumnType {
        match self {
            ColumnData::Int(_) => ColumnType::Int,
            ColumnData::Float(_) => ColumnType::Float,
            ColumnData::Double(_) => ColumnType::Double,
            ColumnData::Short(_) => ColumnType::Short,
            ColumnData::Byte(_) => ColumnType::Byte,
            ColumnData::Char(_) => ColumnType::Char,
        }
    }

    /// Number of stored elements
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::Short(v) => v.len(),
            ColumnData::Byte(v) => v.len(),
            ColumnData::Char(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every element past the first `len`
    pub(crate) fn truncate(&mut self, len: usize) {
        match self {
            ColumnData::Int(v) => v.truncate(len),
            ColumnData::Float(v) => v.truncate(len),
            ColumnData::Double(v) => v.truncate(len),
            ColumnData::Short(v) => v.truncate(len),
            ColumnData::Byte(v) => v.truncate(len),
            ColumnData::Char(v) => v.truncate(len),
        }
    }

    /// Append the first `n` elements of a slot (all of a scalar slot)
    pub(crate) fn push(&mut self, slot: &Slot<'_>, n: usize) -> Result<(), StoreError> {
        match (self, slot) {
            (ColumnData::Int(v), Slot::Int(x)) => v.push(**x),
            (ColumnData::Float(v), Slot::Float(x)) => v.push(**x),
            (ColumnData::Double(v), Slot::Double(x)) => v.push(**x),
            (ColumnData::Short(v), Slot::Short(x)) => v.push(**x),
            (ColumnData::Byte(v), Slot::Byte(x)) => v.push(**x),
            (ColumnData::Char(v), Slot::Char(bytes)) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                v.push(bytes[..end].to_vec());
            }
            (ColumnData::Int(v), Slot::IntArray(xs)) => v.extend_from_slice(&xs[..n]),
            (ColumnData::Float(v), Slot::FloatArray(xs)) => v.extend_from_slice(&xs[..n]),
            (ColumnData::Double(v), Slot::DoubleArray(xs)) => v.extend_from_slice(&xs[..n]),
            (data, slot) => {
                return Err(StoreError::TypeMismatch {
                    column: String::new(),
                    expected: data.ty(),
                    found: slot.ty(),
                });
            }
        }
        Ok(())
    }

    /// Copy the element range `range` into a slot, bounded by slot capacity
    ///
    /// Returns the number of elements copied.
    pub(crate) fn load(
        &self,
        range: std::ops::Range<usize>,
        slot: SlotMut<'_>,
    ) -> Result<usize, StoreError> {
        fn bounded<T: Copy>(src: &[T], dst: &mut [T]) -> usize {
            let n = src.len().min(dst.len());
            dst[..n].copy_from_slice(&src[..n]);
            n
        }

        let copied = match (self, slot) {
            (ColumnData::Int(v), SlotMut::Int(x)) => {
                *x = v[range.start];
                1
            }
            (ColumnData::Float(v), SlotMut::Float(x)) => {
                *x = v[range.start];
                1
            }
            (ColumnData::Double(v), SlotMut::Double(x)) => {
                *x = v[range.start];
                1
            }
            (ColumnData::Short(v), SlotMut::Short(x)) => {
                *x = v[range.start];
                1
            }
            (ColumnData::Byte(v), SlotMut::Byte(x)) => {
                *x = v[range.start];
                1
            }
            (ColumnData::Char(v), SlotMut::Char(dst)) => {
                // keep room for the terminator
                let text = &v[range.start];
                let Some(room) = dst.len().checked_sub(1) else {
                    return Ok(0);
                };
                let n = text.len().min(room);
                dst[..n].copy_from_slice(&text[..n]);
                dst[n] = 0;
                n
            }
            (ColumnData::Int(v), SlotMut::IntArray(dst)) => bounded(&v[range], dst),
            (ColumnData::Float(v), SlotMut::FloatArray(dst)) => bounded(&v[range], dst),
            (ColumnData::Double(v), SlotMut::DoubleArray(dst)) => bounded(&v[range], dst),
            (data, slot) => {
                return Err(StoreError::TypeMismatch {
                    column: String::new(),
                    expected: data.ty(),
                    found: slot.ty(),
                });
            }
        };
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_spec() {
        let desc = ColumnDesc::array("px", ColumnType::Float, "nparticle");
        assert_eq!(desc.leaf_spec(), "px[nparticle]/F");
        assert!(desc.is_array());

        let desc = ColumnDesc::scalar("me_wgt", ColumnType::Double).with_label("me_wtg");
        assert_eq!(desc.name, "me_wgt");
        assert_eq!(desc.leaf_spec(), "me_wtg/D");
    }

    #[test]
    fn test_push_prefix_of_array_slot() {
        let mut data = ColumnData::new(ColumnType::Float);
        let values = [1.0f32, 2.0, 3.0, 4.0];
        data.push(&Slot::FloatArray(&values), 2).unwrap();
        assert_eq!(data, ColumnData::Float(vec![1.0, 2.0]));
    }

    #[test]
    fn test_push_text_stops_at_nul() {
        let mut data = ColumnData::new(ColumnType::Char);
        data.push(&Slot::Char(b"R\0"), 0).unwrap();
        assert_eq!(data, ColumnData::Char(vec![b"R".to_vec()]));
    }

    #[test]
    fn test_load_is_bounded_by_slot_capacity() {
        let data = ColumnData::Int((0..10).collect());
        let mut dst = [0i32; 4];
        let n = data.load(2..10, SlotMut::IntArray(&mut dst)).unwrap();
        assert_eq!(n, 4);
        assert_eq!(dst, [2, 3, 4, 5]);
    }

    #[test]
    fn test_load_text_terminates() {
        let data = ColumnData::Char(vec![b"VIR".to_vec()]);
        let mut dst = [0xffu8; 2];
        data.load(0..1, SlotMut::Char(&mut dst)).unwrap();
        assert_eq!(dst, [b'V', 0]);
    }

    #[test]
    fn test_type_mismatch() {
        let mut data = ColumnData::new(ColumnType::Short);
        let err = data.push(&Slot::Byte(&3), 0).unwrap_err();
        assert!(matches!(
            err,
            StoreError::TypeMismatch {
                expected: ColumnType::Short,
                found: ColumnType::Byte,
                ..
            }
        ));
    }

    #[test]
    fn test_encoded_bound_covers_worst_case() {
        let ints = [i32::MIN, i32::MAX, -1];
        let mut data = ColumnData::new(ColumnType::Int);
        data.push(&Slot::IntArray(&ints), 3).unwrap();
        let encoded = postcard::to_allocvec(&data).unwrap();
        // one byte for the variant, one for the length
        assert!(encoded.len() <= 2 + Slot::IntArray(&ints).encoded_bound(3));

        let mut data = ColumnData::new(ColumnType::Short);
        data.push(&Slot::Short(&i16::MIN), 1).unwrap();
        let encoded = postcard::to_allocvec(&data).unwrap();
        assert!(encoded.len() <= 2 + Slot::Short(&i16::MIN).encoded_bound(1));
    }

    #[test]
    fn test_truncate() {
        let mut data = ColumnData::Char(vec![b"B".to_vec(), b"R".to_vec()]);
        data.truncate(1);
        assert_eq!(data, ColumnData::Char(vec![b"B".to_vec()]));
        data.truncate(5);
        assert_eq!(data.len(), 1);
    }
}
