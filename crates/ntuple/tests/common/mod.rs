//! Shared helpers for ntuple integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use ntuple::schema::{self, BindMode};
use ntuple::{Event, Field, Generation, NtupleConfig, Part};
use ntuple_store::{Container, Directory, Mode, Slot, SlotId, SlotMut, Slots, TableOptions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Array capacity of a [`RawRow`], larger than any valid count
pub const RAW_CAPACITY: usize = 256;

/// A row written straight through the engine, bypassing writer validation
///
/// Counts may be negative or larger than the event maxima, which lets tests
/// produce the corrupt files a reader has to reject.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub id: i32,
    pub nparticle: i32,
    pub px: Vec<f32>,
    pub py: Vec<f32>,
    pub pz: Vec<f32>,
    pub energy: Vec<f32>,
    pub alphas: f64,
    pub kf: Vec<i32>,
    pub weight: f64,
    pub weight2: f64,
    pub me_wgt: f64,
    pub me_wgt2: f64,
    pub x1: f64,
    pub x2: f64,
    pub x1p: f64,
    pub x2p: f64,
    pub id1: i32,
    pub id2: i32,
    pub fac_scale: f64,
    pub ren_scale: f64,
    pub nuwgt: i32,
    pub usr_wgts: Vec<f64>,
    pub part: [u8; 2],
    pub alphas_power: i16,
    pub alphas_power_char: i8,
}

impl RawRow {
    pub fn new(nparticle: i32, nuwgt: i32) -> Self {
        Self {
            id: 0,
            nparticle,
            px: (0..RAW_CAPACITY).map(|i| i as f32).collect(),
            py: vec![0.5; RAW_CAPACITY],
            pz: vec![-0.5; RAW_CAPACITY],
            energy: vec![1.0; RAW_CAPACITY],
            alphas: 0.118,
            kf: vec![21; RAW_CAPACITY],
            weight: 1.0,
            weight2: 1.0,
            me_wgt: 0.0,
            me_wgt2: 0.0,
            x1: 0.1,
            x2: 0.2,
            x1p: 0.0,
            x2p: 0.0,
            id1: 21,
            id2: 21,
            fac_scale: 91.1876,
            ren_scale: 91.1876,
            nuwgt,
            usr_wgts: vec![0.25; RAW_CAPACITY],
            part: [b'B', 0],
            alphas_power: 0,
            alphas_power_char: 0,
        }
    }

    /// Set alpha_s power for both layouts
    pub fn with_alphas_power(mut self, power: i8) -> Self {
        self.alphas_power = i16::from(power);
        self.alphas_power_char = power;
        self
    }
}

impl Slots for RawRow {
    fn slot(&self, id: SlotId) -> Option<Slot<'_>> {
        let slot = match Field::from_slot(id)? {
            Field::Id => Slot::Int(&self.id),
            Field::NParticle => Slot::Int(&self.nparticle),
            Field::Px => Slot::FloatArray(&self.px),
            Field::Py => Slot::FloatArray(&self.py),
            Field::Pz => Slot::FloatArray(&self.pz),
            Field::Energy => Slot::FloatArray(&self.energy),
            Field::Alphas => Slot::Double(&self.alphas),
            Field::PdgCode => Slot::IntArray(&self.kf),
            Field::Weight => Slot::Double(&self.weight),
            Field::Weight2 => Slot::Double(&self.weight2),
            Field::MeWeight => Slot::Double(&self.me_wgt),
            Field::MeWeight2 => Slot::Double(&self.me_wgt2),
            Field::X1 => Slot::Double(&self.x1),
            Field::X2 => Slot::Double(&self.x2),
            Field::X1p => Slot::Double(&self.x1p),
            Field::X2p => Slot::Double(&self.x2p),
            Field::Id1 => Slot::Int(&self.id1),
            Field::Id2 => Slot::Int(&self.id2),
            Field::FacScale => Slot::Double(&self.fac_scale),
            Field::RenScale => Slot::Double(&self.ren_scale),
            Field::NUserWeights => Slot::Int(&self.nuwgt),
            Field::UserWeights => Slot::DoubleArray(&self.usr_wgts),
            Field::Part => Slot::Char(&self.part),
            Field::AlphasPower => Slot::Short(&self.alphas_power),
            Field::AlphasPowerLegacy => Slot::Byte(&self.alphas_power_char),
        };
        Some(slot)
    }

    // rows are only written, never loaded
    fn slot_mut(&mut self, _id: SlotId) -> Option<SlotMut<'_>> {
        None
    }
}

/// Write `rows` to `path` in the given layout, directly through the engine
pub fn write_raw(path: &Path, generation: Generation, rows: &[RawRow]) {
    let directory = Directory::new();
    let mut cwd = directory.lock();
    let mut container = Container::open(&mut cwd, path, Mode::Recreate).unwrap();
    let table = container
        .create_table(generation.table_name(), "raw rows", TableOptions::default())
        .unwrap();
    schema::bind(container.table_mut(table), generation, BindMode::Declare).unwrap();
    for row in rows {
        container.table_mut(table).fill(&mut cwd, row).unwrap();
    }
    container.close(&mut cwd).unwrap();
}

/// Configuration with a private directory and small baskets
pub fn small_baskets(entries: usize) -> NtupleConfig {
    NtupleConfig::default()
        .with_directory(Arc::new(Directory::new()))
        .with_basket_entries(entries)
        .with_sync_on_close(false)
}

/// A random valid event
pub fn sample_event(rng: &mut StdRng, id: i32) -> Event {
    let mut event = Event {
        id,
        alphas: rng.random_range(0.1..0.13),
        weight: rng.random_range(-10.0..10.0),
        weight2: rng.random_range(-10.0..10.0),
        me_weight: rng.random(),
        me_weight2: rng.random(),
        x1: rng.random(),
        x2: rng.random(),
        x1p: rng.random(),
        x2p: rng.random(),
        id1: rng.random_range(-5..=5),
        id2: rng.random_range(-5..=5),
        fac_scale: rng.random_range(10.0..1000.0),
        ren_scale: rng.random_range(10.0..1000.0),
        part: [Part::B, Part::I, Part::R, Part::V][rng.random_range(0..4)],
        alphas_power: rng.random_range(0..=4),
        ..Event::default()
    };
    for _ in 0..rng.random_range(0..=12) {
        let p = [
            rng.random_range(0.0..500.0),
            rng.random_range(-100.0..100.0),
            rng.random_range(-100.0..100.0),
            rng.random_range(-500.0..500.0),
        ];
        event.push_particle(rng.random_range(-16..=21), p);
    }
    for _ in 0..rng.random_range(0..=6) {
        event.push_user_weight(rng.random_range(-1.0..1.0));
    }
    event
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
