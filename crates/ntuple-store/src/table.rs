//! Tables: named sets of columns filled entry by entry
//!
//! Filled entries accumulate in an in-memory basket. When the basket reaches
//! [`TableOptions::basket_entries`] rows, or would grow past
//! [`TableOptions::basket_bytes`], it is written as one record to the current
//! container of the [`Cwd`] passed in.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::column::{ColumnData, ColumnDesc, ColumnType, Slot, SlotId, Slots};
use crate::container::MAX_RECORD_LEN;
use crate::directory::Cwd;
use crate::error::StoreError;

/// Largest basket payload a table will build, well under the record limit
pub const MAX_BASKET_BYTES: usize = MAX_RECORD_LEN as usize / 2;

/// Handle to a table inside its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub(crate) usize);

/// Position of a column in its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(pub usize);

/// Options for a newly created table
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Entries per basket before it is written out
    pub basket_entries: usize,
    /// Estimated payload size at which a basket is written out early,
    /// capped at [`MAX_BASKET_BYTES`]
    pub basket_bytes: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            basket_entries: 1000,
            basket_bytes: 16 * 1024 * 1024,
        }
    }
}

impl TableOptions {
    pub fn with_basket_entries(mut self, entries: usize) -> Self {
        self.basket_entries = entries;
        self
    }

    pub fn with_basket_bytes(mut self, bytes: usize) -> Self {
        self.basket_bytes = bytes;
        self
    }
}

/// Where a basket lives on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLocation {
    /// Record offset in the container file
    pub offset: u64,
    /// Payload length in bytes
    pub len: u32,
    /// Index of the first entry in the basket
    pub first_entry: u64,
    /// Number of entries in the basket
    pub entries: u32,
    /// BLAKE3 hash of the payload
    pub checksum: [u8; 32],
}

impl BasketLocation {
    /// First 8 bytes of the checksum as hex, for logs
    pub fn short_checksum(&self) -> String {
        hex::encode(&self.checksum[..8])
    }

    fn contains(&self, entry: u64) -> bool {
        entry >= self.first_entry && entry < self.first_entry + u64::from(self.entries)
    }
}

/// On-disk basket payload
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Basket {
    table: String,
    first_entry: u64,
    entries: u32,
    columns: Vec<ColumnData>,
}

/// Persisted description of a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TableMeta {
    name: String,
    title: String,
    columns: Vec<ColumnDesc>,
    entries: u64,
    baskets: Vec<BasketLocation>,
}

/// A basket decoded and checked against the table's columns
#[derive(Debug)]
struct LoadedBasket {
    first_entry: u64,
    entries: u32,
    columns: Vec<ColumnData>,
    /// Per array column: element offsets, `entries + 1` long
    offsets: Vec<Option<Vec<usize>>>,
}

impl LoadedBasket {
    fn index(descs: &[ColumnDesc], basket: Basket) -> Result<Self, StoreError> {
        if basket.columns.len() != descs.len() {
            return Err(StoreError::corrupt(format!(
                "basket has {} columns, table has {}",
                basket.columns.len(),
                descs.len()
            )));
        }
        let entries = basket.entries as usize;

        let mut offsets = Vec::with_capacity(descs.len());
        for (desc, data) in descs.iter().zip(&basket.columns) {
            if data.ty() != desc.ty {
                return Err(StoreError::corrupt(format!(
                    "column `{}` stored as {:?}, declared {:?}",
                    desc.name,
                    data.ty(),
                    desc.ty
                )));
            }

            let Some(count) = &desc.count else {
                if data.len() != entries {
                    return Err(StoreError::corrupt(format!(
                        "column `{}` has {} values for {} entries",
                        desc.name,
                        data.len(),
                        entries
                    )));
                }
                offsets.push(None);
                continue;
            };

            let counts = descs
                .iter()
                .position(|d| &d.name == count)
                .and_then(|i| match &basket.columns[i] {
                    ColumnData::Int(v) if v.len() == entries => Some(v),
                    _ => None,
                })
                .ok_or_else(|| {
                    StoreError::corrupt(format!("count column `{count}` unusable"))
                })?;

            let mut column_offsets = Vec::with_capacity(entries + 1);
            let mut total = 0usize;
            column_offsets.push(0);
            for &c in counts {
                total += usize::try_from(c).unwrap_or(0);
                column_offsets.push(total);
            }
            if total != data.len() {
                return Err(StoreError::corrupt(format!(
                    "array column `{}` has {} values, counts sum to {}",
                    desc.name,
                    data.len(),
                    total
                )));
            }
            offsets.push(Some(column_offsets));
        }

        Ok(Self {
            first_entry: basket.first_entry,
            entries: basket.entries,
            columns: basket.columns,
            offsets,
        })
    }

    fn range(&self, column: usize, local: usize) -> std::ops::Range<usize> {
        match &self.offsets[column] {
            Some(offsets) => offsets[local]..offsets[local + 1],
            None => local..local + 1,
        }
    }
}

/// A table of typed columns
#[derive(Debug)]
pub struct Table {
    name: String,
    title: String,
    columns: Vec<ColumnDesc>,
    bindings: Vec<Option<SlotId>>,
    entries: u64,
    baskets: Vec<BasketLocation>,
    writable: bool,
    basket_entries: usize,
    basket_bytes: usize,
    pending: Vec<ColumnData>,
    pending_entries: u32,
    pending_bytes: usize,
    cache: Option<LoadedBasket>,
}

impl Table {
    pub(crate) fn new(name: String, title: String, options: TableOptions) -> Self {
        Self {
            name,
            title,
            columns: Vec::new(),
            bindings: Vec::new(),
            entries: 0,
            baskets: Vec::new(),
            writable: true,
            basket_entries: options.basket_entries.max(1),
            basket_bytes: options.basket_bytes.clamp(1, MAX_BASKET_BYTES),
            pending: Vec::new(),
            pending_entries: 0,
            pending_bytes: 0,
            cache: None,
        }
    }

    pub(crate) fn from_meta(meta: TableMeta) -> Self {
        let pending = meta.columns.iter().map(|c| ColumnData::new(c.ty)).collect();
        Self {
            bindings: vec![None; meta.columns.len()],
            name: meta.name,
            title: meta.title,
            columns: meta.columns,
            entries: meta.entries,
            baskets: meta.baskets,
            writable: false,
            basket_entries: 1,
            basket_bytes: MAX_BASKET_BYTES,
            pending,
            pending_entries: 0,
            pending_bytes: 0,
            cache: None,
        }
    }

    pub(crate) fn meta(&self) -> TableMeta {
        TableMeta {
            name: self.name.clone(),
            title: self.title.clone(),
            columns: self.columns.clone(),
            entries: self.entries,
            baskets: self.baskets.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of entries, including entries not yet written to disk
    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<(ColumnId, &ColumnDesc)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == name)
            .map(|(i, c)| (ColumnId(i), c))
    }

    pub fn baskets(&self) -> &[BasketLocation] {
        &self.baskets
    }

    /// Declare a new column bound to `slot`
    ///
    /// Array columns require their count column to be declared first, as a
    /// scalar `Int` column.
    pub fn branch(&mut self, desc: ColumnDesc, slot: SlotId) -> Result<ColumnId, StoreError> {
        if !self.writable {
            return Err(StoreError::ReadOnly(self.name.clone()));
        }
        if self.entries > 0 {
            return Err(StoreError::Unsupported(desc.name));
        }
        if self.column(&desc.name).is_some() {
            return Err(StoreError::ColumnExists(desc.name));
        }
        if let Some(count) = &desc.count {
            if desc.ty == ColumnType::Char {
                return Err(StoreError::Unsupported(desc.name));
            }
            let (_, count_desc) = self
                .column(count)
                .ok_or_else(|| StoreError::NoSuchColumn(count.clone()))?;
            if count_desc.ty != ColumnType::Int || count_desc.is_array() {
                return Err(StoreError::TypeMismatch {
                    column: count.clone(),
                    expected: ColumnType::Int,
                    found: count_desc.ty,
                });
            }
        }

        trace!(table = %self.name, leaf = %desc.leaf_spec(), "Declared column");
        self.pending.push(ColumnData::new(desc.ty));
        self.columns.push(desc);
        self.bindings.push(Some(slot));
        Ok(ColumnId(self.columns.len() - 1))
    }

    /// Bind an existing column to `slot`
    pub fn set_branch_address(
        &mut self,
        name: &str,
        ty: ColumnType,
        slot: SlotId,
    ) -> Result<ColumnId, StoreError> {
        let (id, desc) = self
            .column(name)
            .ok_or_else(|| StoreError::NoSuchColumn(name.to_string()))?;
        if desc.ty != ty {
            return Err(StoreError::TypeMismatch {
                column: name.to_string(),
                expected: desc.ty,
                found: ty,
            });
        }
        self.bindings[id.0] = Some(slot);
        Ok(id)
    }

    fn bound_slot(&self, column: usize) -> Result<SlotId, StoreError> {
        self.bindings[column].ok_or_else(|| StoreError::Unbound(self.columns[column].name.clone()))
    }

    /// Element count of an array column for the row held in `slots`
    fn array_len(&self, desc: &ColumnDesc, count: &str, slots: &impl Slots, capacity: usize) -> Result<usize, StoreError> {
        let (count_id, _) = self
            .column(count)
            .ok_or_else(|| StoreError::NoSuchColumn(count.to_string()))?;
        let count_slot = self.bound_slot(count_id.0)?;
        let value = match slots.slot(count_slot) {
            Some(Slot::Int(v)) => *v,
            Some(other) => {
                return Err(StoreError::TypeMismatch {
                    column: count.to_string(),
                    expected: ColumnType::Int,
                    found: other.ty(),
                });
            }
            None => {
                return Err(StoreError::NoSuchSlot {
                    column: count.to_string(),
                    slot: count_slot.0,
                });
            }
        };
        match usize::try_from(value) {
            Err(_) => Ok(0),
            Ok(n) if n > capacity => Err(StoreError::CountExceedsCapacity {
                column: desc.name.clone(),
                count: value,
                capacity,
            }),
            Ok(n) => Ok(n),
        }
    }

    /// Append the values currently held in `slots` as a new entry
    ///
    /// Either the whole row is stored or nothing is: if the basket write this
    /// fill triggers fails, the row is taken back out and the entry count is
    /// left unchanged. Returns the index of the new entry.
    pub fn fill(&mut self, cwd: &mut Cwd<'_>, slots: &impl Slots) -> Result<u64, StoreError> {
        if !self.writable {
            return Err(StoreError::ReadOnly(self.name.clone()));
        }

        let mut staged = Vec::with_capacity(self.columns.len());
        for (i, desc) in self.columns.iter().enumerate() {
            let id = self.bound_slot(i)?;
            let slot = slots.slot(id).ok_or_else(|| StoreError::NoSuchSlot {
                column: desc.name.clone(),
                slot: id.0,
            })?;
            if slot.ty() != desc.ty || slot.is_array() != desc.is_array() {
                return Err(StoreError::TypeMismatch {
                    column: desc.name.clone(),
                    expected: desc.ty,
                    found: slot.ty(),
                });
            }
            let n = match (&desc.count, &slot) {
                (Some(count), Slot::IntArray(v)) => self.array_len(desc, count, slots, v.len())?,
                (Some(count), Slot::FloatArray(v)) => {
                    self.array_len(desc, count, slots, v.len())?
                }
                (Some(count), Slot::DoubleArray(v)) => {
                    self.array_len(desc, count, slots, v.len())?
                }
                _ => 1,
            };
            staged.push((slot, n));
        }

        let row_bytes: usize = staged.iter().map(|(slot, n)| slot.encoded_bound(*n)).sum();
        if self.pending_entries > 0 && self.pending_bytes + row_bytes > self.basket_bytes {
            self.write_basket(cwd)?;
        }

        let marks: Vec<usize> = self.pending.iter().map(ColumnData::len).collect();
        let pushed = staged
            .iter()
            .zip(&mut self.pending)
            .try_for_each(|((slot, n), data)| data.push(slot, *n));
        if let Err(e) = pushed {
            self.truncate_pending(&marks);
            return Err(e);
        }
        self.pending_entries += 1;
        self.pending_bytes += row_bytes;
        self.entries += 1;
        let entry = self.entries - 1;

        if self.pending_entries as usize >= self.basket_entries {
            if let Err(e) = self.write_basket(cwd) {
                self.truncate_pending(&marks);
                self.pending_entries -= 1;
                self.pending_bytes -= row_bytes;
                self.entries -= 1;
                debug!(table = %self.name, entry, error = %e, "Rolled back entry");
                return Err(e);
            }
        }
        Ok(entry)
    }

    fn truncate_pending(&mut self, marks: &[usize]) {
        for (data, &len) in self.pending.iter_mut().zip(marks) {
            data.truncate(len);
        }
    }

    /// Write any pending entries as a basket to the current container
    pub fn flush(&mut self, cwd: &mut Cwd<'_>) -> Result<(), StoreError> {
        self.write_basket(cwd)
    }

    fn write_basket(&mut self, cwd: &mut Cwd<'_>) -> Result<(), StoreError> {
        if self.pending_entries == 0 {
            return Ok(());
        }
        let fresh = self.columns.iter().map(|c| ColumnData::new(c.ty)).collect();
        let basket = Basket {
            table: self.name.clone(),
            first_entry: self.entries - u64::from(self.pending_entries),
            entries: self.pending_entries,
            columns: std::mem::replace(&mut self.pending, fresh),
        };

        match Self::store_basket(cwd, &basket) {
            Ok(location) => {
                debug!(
                    table = %self.name,
                    container = ?cwd.pwd(),
                    offset = location.offset,
                    entries = location.entries,
                    checksum = %location.short_checksum(),
                    "Wrote basket"
                );
                self.baskets.push(location);
                self.pending_entries = 0;
                self.pending_bytes = 0;
                Ok(())
            }
            Err(e) => {
                self.pending = basket.columns;
                Err(e)
            }
        }
    }

    fn store_basket(cwd: &Cwd<'_>, basket: &Basket) -> Result<BasketLocation, StoreError> {
        let payload =
            postcard::to_allocvec(basket).map_err(|e| StoreError::serialization(e.to_string()))?;
        let checksum = *blake3::hash(&payload).as_bytes();
        let offset = cwd.backing()?.lock().append_record(&payload)?;
        Ok(BasketLocation {
            offset,
            len: payload.len() as u32,
            first_entry: basket.first_entry,
            entries: basket.entries,
            checksum,
        })
    }

    fn read_basket(&self, cwd: &Cwd<'_>, location: &BasketLocation) -> Result<LoadedBasket, StoreError> {
        let payload = cwd.backing()?.lock().read_record(location.offset)?;
        if payload.len() != location.len as usize
            || blake3::hash(&payload).as_bytes() != &location.checksum
        {
            return Err(StoreError::corrupt(format!(
                "basket checksum mismatch at offset {} in table `{}`",
                location.offset, self.name
            )));
        }
        let basket: Basket = postcard::from_bytes(&payload)?;
        if basket.table != self.name
            || basket.first_entry != location.first_entry
            || basket.entries != location.entries
        {
            return Err(StoreError::corrupt(format!(
                "basket at offset {} does not belong to table `{}`",
                location.offset, self.name
            )));
        }
        debug!(table = %self.name, first_entry = basket.first_entry, entries = basket.entries, "Loaded basket");
        LoadedBasket::index(&self.columns, basket)
    }

    /// Load entry `index` into the bound slots
    ///
    /// Returns `Ok(None)` if there is no such entry. Array values are copied
    /// up to the capacity of the destination slot; the count columns are
    /// loaded as stored. Returns the number of values copied.
    pub fn get_entry(
        &mut self,
        cwd: &mut Cwd<'_>,
        index: i64,
        slots: &mut impl Slots,
    ) -> Result<Option<usize>, StoreError> {
        let Ok(entry) = u64::try_from(index) else {
            return Ok(None);
        };
        if entry >= self.entries {
            return Ok(None);
        }

        let flushed = self.entries - u64::from(self.pending_entries);
        if entry >= flushed {
            let basket = Basket {
                table: self.name.clone(),
                first_entry: flushed,
                entries: self.pending_entries,
                columns: self.pending.clone(),
            };
            let loaded = LoadedBasket::index(&self.columns, basket)?;
            return self.copy_out(&loaded, entry, slots).map(Some);
        }

        let cached = self
            .cache
            .as_ref()
            .is_some_and(|c| entry >= c.first_entry && entry < c.first_entry + u64::from(c.entries));
        if !cached {
            let pos = self
                .baskets
                .partition_point(|b| b.first_entry + u64::from(b.entries) <= entry);
            let location = self
                .baskets
                .get(pos)
                .filter(|b| b.contains(entry))
                .ok_or_else(|| StoreError::corrupt(format!("no basket holds entry {entry}")))?
                .clone();
            self.cache = None;
            self.cache = Some(self.read_basket(cwd, &location)?);
        }

        match &self.cache {
            Some(loaded) => self.copy_out(loaded, entry, slots).map(Some),
            None => Err(StoreError::corrupt("basket cache empty")),
        }
    }

    fn copy_out(
        &self,
        loaded: &LoadedBasket,
        entry: u64,
        slots: &mut impl Slots,
    ) -> Result<usize, StoreError> {
        let local = (entry - loaded.first_entry) as usize;
        let mut copied = 0;
        for (i, desc) in self.columns.iter().enumerate() {
            let Some(id) = self.bindings[i] else {
                continue;
            };
            let dst = slots.slot_mut(id).ok_or_else(|| StoreError::NoSuchSlot {
                column: desc.name.clone(),
                slot: id.0,
            })?;
            copied += loaded.columns[i]
                .load(loaded.range(i, local), dst)
                .map_err(|e| match e {
                    StoreError::TypeMismatch {
                        expected, found, ..
                    } => StoreError::TypeMismatch {
                        column: desc.name.clone(),
                        expected,
                        found,
                    },
                    other => other,
                })?;
        }
        Ok(copied)
    }
}
