//! Stress tests for ntuple-store
//!
//! Many entries, many baskets, several tables per container and several
//! containers per directory.

use std::sync::Arc;
use std::thread;

use ntuple_store::{
    ColumnDesc, ColumnType, Container, Directory, Mode, Slot, SlotId, SlotMut, Slots, StoreError,
    TableOptions,
};
use tempfile::TempDir;

const ID: SlotId = SlotId(0);
const N: SlotId = SlotId(1);
const VALUES: SlotId = SlotId(2);
const FLAG: SlotId = SlotId(3);

struct Row {
    id: i32,
    n: i32,
    values: [f64; 16],
    flag: i8,
}

impl Row {
    fn new() -> Self {
        Self {
            id: 0,
            n: 0,
            values: [0.0; 16],
            flag: 0,
        }
    }

    fn set(&mut self, id: i32) {
        self.id = id;
        self.n = id % 17;
        for (i, v) in self.values.iter_mut().enumerate() {
            *v = f64::from(id) + i as f64 / 100.0;
        }
        self.flag = (id % 128) as i8;
    }
}

impl Slots for Row {
    fn slot(&self, id: SlotId) -> Option<Slot<'_>> {
        match id {
            ID => Some(Slot::Int(&self.id)),
            N => Some(Slot::Int(&self.n)),
            VALUES => Some(Slot::DoubleArray(&self.values)),
            FLAG => Some(Slot::Byte(&self.flag)),
            _ => None,
        }
    }

    fn slot_mut(&mut self, id: SlotId) -> Option<SlotMut<'_>> {
        match id {
            ID => Some(SlotMut::Int(&mut self.id)),
            N => Some(SlotMut::Int(&mut self.n)),
            VALUES => Some(SlotMut::DoubleArray(&mut self.values)),
            FLAG => Some(SlotMut::Byte(&mut self.flag)),
            _ => None,
        }
    }
}

fn columns() -> [(ColumnDesc, SlotId); 4] {
    [
        (ColumnDesc::scalar("id", ColumnType::Int), ID),
        (ColumnDesc::scalar("n", ColumnType::Int), N),
        (ColumnDesc::array("values", ColumnType::Double, "n"), VALUES),
        (ColumnDesc::scalar("flag", ColumnType::Byte), FLAG),
    ]
}

// ============================================================================
// Throughput
// ============================================================================

/// 10,000 entries with ragged arrays survive a close/open cycle
#[test]
fn test_many_entries_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("many.ntpl");
    let directory = Directory::new();
    let total = 10_000;

    {
        let mut cwd = directory.lock();
        let mut container = Container::open(&mut cwd, &path, Mode::Recreate).unwrap();
        let t = container
            .create_table("rows", "", TableOptions::default().with_basket_entries(333))
            .unwrap();
        for (desc, slot) in columns() {
            container.table_mut(t).branch(desc, slot).unwrap();
        }
        let mut row = Row::new();
        for id in 0..total {
            row.set(id);
            container.table_mut(t).fill(&mut cwd, &row).unwrap();
        }
        container.close(&mut cwd).unwrap();
    }

    let mut cwd = directory.lock();
    let mut container = Container::open(&mut cwd, &path, Mode::Read).unwrap();
    let t = container.get("rows").unwrap();
    let table = container.table_mut(t);
    assert_eq!(table.entries(), total as u64);
    assert_eq!(table.baskets().len(), (total as usize).div_ceil(333));
    for (desc, slot) in columns() {
        table.set_branch_address(&desc.name, desc.ty, slot).unwrap();
    }

    let mut row = Row::new();
    for id in (0..total).step_by(97) {
        table.get_entry(&mut cwd, i64::from(id), &mut row).unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.n, id % 17);
        for i in 0..row.n as usize {
            assert_eq!(row.values[i], f64::from(id) + i as f64 / 100.0);
        }
        assert_eq!(row.flag, (id % 128) as i8);
    }
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_several_tables_in_one_container() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tables.ntpl");
    let directory = Directory::new();

    {
        let mut cwd = directory.lock();
        let mut container = Container::open(&mut cwd, &path, Mode::Recreate).unwrap();
        let a = container
            .create_table("a", "first", TableOptions::default().with_basket_entries(2))
            .unwrap();
        let b = container
            .create_table("b", "second", TableOptions::default().with_basket_entries(3))
            .unwrap();
        for (desc, slot) in columns() {
            container.table_mut(a).branch(desc.clone(), slot).unwrap();
            container.table_mut(b).branch(desc, slot).unwrap();
        }
        let mut row = Row::new();
        for id in 0..10 {
            row.set(id);
            container.table_mut(a).fill(&mut cwd, &row).unwrap();
            row.set(-id);
            container.table_mut(b).fill(&mut cwd, &row).unwrap();
        }
        container.close(&mut cwd).unwrap();
    }

    let mut cwd = directory.lock();
    let mut container = Container::open(&mut cwd, &path, Mode::Read).unwrap();
    let names: Vec<&str> = container.tables().map(|t| t.name()).collect();
    assert_eq!(names, vec!["a", "b"]);

    let b = container.get("b").unwrap();
    let table = container.table_mut(b);
    assert_eq!(table.title(), "second");
    table.set_branch_address("id", ColumnType::Int, ID).unwrap();

    // only the bound column is loaded
    let mut row = Row::new();
    table.get_entry(&mut cwd, 9, &mut row).unwrap().unwrap();
    assert_eq!(row.id, -9);
    assert_eq!(row.n, 0);
}

#[test]
fn test_truncated_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cut.ntpl");
    let directory = Directory::new();
    let mut cwd = directory.lock();

    let mut container = Container::open(&mut cwd, &path, Mode::Recreate).unwrap();
    let t = container
        .create_table("rows", "", TableOptions::default())
        .unwrap();
    for (desc, slot) in columns() {
        container.table_mut(t).branch(desc, slot).unwrap();
    }
    container.table_mut(t).fill(&mut cwd, &Row::new()).unwrap();
    container.close(&mut cwd).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

    let err = Container::open(&mut cwd, &path, Mode::Read).unwrap_err();
    assert!(matches!(err, StoreError::NotAContainer(_)));
}

// ============================================================================
// Failed basket writes
// ============================================================================

/// A fill whose basket write fails stores nothing, and the table recovers
#[test]
fn test_failed_fill_is_rolled_back() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("rollback.ntpl");
    let other_path = temp.path().join("other.ntpl");
    let directory = Directory::new();
    let mut cwd = directory.lock();

    Container::open(&mut cwd, &other_path, Mode::Recreate)
        .unwrap()
        .close(&mut cwd)
        .unwrap();

    let mut container = Container::open(&mut cwd, &path, Mode::Recreate).unwrap();
    let t = container
        .create_table("rows", "", TableOptions::default().with_basket_entries(4))
        .unwrap();
    for (desc, slot) in columns() {
        container.table_mut(t).branch(desc, slot).unwrap();
    }
    let mut row = Row::new();
    for id in 0..3 {
        row.set(id);
        container.table_mut(t).fill(&mut cwd, &row).unwrap();
    }

    // the fourth entry completes the basket, which now goes to a read-only file
    let other = Container::open(&mut cwd, &other_path, Mode::Read).unwrap();
    row.set(3);
    for _ in 0..3 {
        let err = container.table_mut(t).fill(&mut cwd, &row).unwrap_err();
        assert!(matches!(err, StoreError::ReadOnly(_)));
        assert_eq!(container.table(t).entries(), 3);
        assert!(container.table(t).baskets().is_empty());
    }

    cwd.cd(&container);
    for id in 3..6 {
        row.set(id);
        assert_eq!(container.table_mut(t).fill(&mut cwd, &row).unwrap(), id as u64);
    }
    assert_eq!(container.table(t).baskets().len(), 1);
    container.close(&mut cwd).unwrap();
    other.close(&mut cwd).unwrap();

    let mut container = Container::open(&mut cwd, &path, Mode::Read).unwrap();
    let t = container.get("rows").unwrap();
    let table = container.table_mut(t);
    assert_eq!(table.entries(), 6);
    for (desc, slot) in columns() {
        table.set_branch_address(&desc.name, desc.ty, slot).unwrap();
    }
    let mut row = Row::new();
    for id in 0..6 {
        table.get_entry(&mut cwd, i64::from(id), &mut row).unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.n, id % 17);
    }
}

/// Baskets are cut by size before they outgrow the byte budget
#[test]
fn test_basket_byte_budget() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("budget.ntpl");
    let directory = Directory::new();
    let budget = 4096;
    let total = 2_000;

    {
        let mut cwd = directory.lock();
        let mut container = Container::open(&mut cwd, &path, Mode::Recreate).unwrap();
        let options = TableOptions::default()
            .with_basket_entries(usize::MAX)
            .with_basket_bytes(budget);
        let t = container.create_table("rows", "", options).unwrap();
        for (desc, slot) in columns() {
            container.table_mut(t).branch(desc, slot).unwrap();
        }
        let mut row = Row::new();
        for id in 0..total {
            row.set(id);
            container.table_mut(t).fill(&mut cwd, &row).unwrap();
        }
        container.close(&mut cwd).unwrap();
    }

    let mut cwd = directory.lock();
    let mut container = Container::open(&mut cwd, &path, Mode::Read).unwrap();
    let t = container.get("rows").unwrap();
    let table = container.table_mut(t);
    assert_eq!(table.entries(), total as u64);
    assert!(table.baskets().len() > 1);
    for basket in table.baskets() {
        // postcard framing adds a few bytes per column on top of the values
        assert!((basket.len as usize) < budget + 64, "basket of {} bytes", basket.len);
    }
    table.set_branch_address("id", ColumnType::Int, ID).unwrap();
    let mut row = Row::new();
    table.get_entry(&mut cwd, i64::from(total - 1), &mut row).unwrap().unwrap();
    assert_eq!(row.id, total - 1);
}

// ============================================================================
// Concurrent access
// ============================================================================

/// Threads sharing one directory, each re-selecting its own container
#[test]
fn test_threads_sharing_directory() {
    let temp = TempDir::new().unwrap();
    let directory = Arc::new(Directory::new());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let directory = Arc::clone(&directory);
            let path = temp.path().join(format!("t{t}.ntpl"));
            thread::spawn(move || {
                let mut container = {
                    let mut cwd = directory.lock();
                    let mut container = Container::open(&mut cwd, &path, Mode::Recreate).unwrap();
                    let id = container
                        .create_table("rows", "", TableOptions::default().with_basket_entries(1))
                        .unwrap();
                    for (desc, slot) in columns() {
                        container.table_mut(id).branch(desc, slot).unwrap();
                    }
                    container
                };
                let id = container.get("rows").unwrap();

                let mut row = Row::new();
                for i in 0..50 {
                    row.set(t * 1000 + i);
                    let mut cwd = directory.lock();
                    cwd.cd(&container);
                    container.table_mut(id).fill(&mut cwd, &row).unwrap();
                }

                let mut cwd = directory.lock();
                cwd.cd(&container);
                container.close(&mut cwd).unwrap();
                path
            })
        })
        .collect();

    for (t, handle) in handles.into_iter().enumerate() {
        let path = handle.join().unwrap();
        let mut cwd = directory.lock();
        let mut container = Container::open(&mut cwd, &path, Mode::Read).unwrap();
        let id = container.get("rows").unwrap();
        let table = container.table_mut(id);
        assert_eq!(table.entries(), 50);
        table.set_branch_address("id", ColumnType::Int, ID).unwrap();

        let mut row = Row::new();
        for i in 0..50 {
            table.get_entry(&mut cwd, i, &mut row).unwrap().unwrap();
            assert_eq!(row.id, t as i32 * 1000 + i as i32);
        }
    }
}
