//! Fixed-capacity storage for one event
//!
//! [`EventBuffer`] mirrors the on-disk column layout. Array slots always have
//! maximal capacity; only the first `nparticle` / `nuwgt` elements carry data
//! for the current entry. No validation happens here.

use ntuple_store::{Slot, SlotId, SlotMut, Slots};

use crate::event::{Event, EventView, MAX_NPARTICLE, MAX_NWGT, Part};
use crate::schema::Generation;

/// Logical event field, one per buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    NParticle,
    Px,
    Py,
    Pz,
    Energy,
    Alphas,
    PdgCode,
    Weight,
    Weight2,
    MeWeight,
    MeWeight2,
    X1,
    X2,
    X1p,
    X2p,
    Id1,
    Id2,
    FacScale,
    RenScale,
    NUserWeights,
    UserWeights,
    Part,
    /// 16-bit alpha_s power, current layout
    AlphasPower,
    /// 1-byte alpha_s power, legacy layout
    AlphasPowerLegacy,
}

impl Field {
    /// All fields, in slot order
    pub const ALL: [Field; 25] = [
        Field::Id,
        Field::NParticle,
        Field::Px,
        Field::Py,
        Field::Pz,
        Field::Energy,
        Field::Alphas,
        Field::PdgCode,
        Field::Weight,
        Field::Weight2,
        Field::MeWeight,
        Field::MeWeight2,
        Field::X1,
        Field::X2,
        Field::X1p,
        Field::X2p,
        Field::Id1,
        Field::Id2,
        Field::FacScale,
        Field::RenScale,
        Field::NUserWeights,
        Field::UserWeights,
        Field::Part,
        Field::AlphasPower,
        Field::AlphasPowerLegacy,
    ];

    pub fn slot(self) -> SlotId {
        SlotId(self as usize)
    }

    pub fn from_slot(id: SlotId) -> Option<Self> {
        Self::ALL.get(id.0).copied()
    }
}

/// Bounded column storage for a single event
#[derive(Debug, Clone)]
pub struct EventBuffer {
    pub(crate) id: i32,
    pub(crate) nparticle: i32,
    pub(crate) px: [f32; MAX_NPARTICLE],
    pub(crate) py: [f32; MAX_NPARTICLE],
    pub(crate) pz: [f32; MAX_NPARTICLE],
    pub(crate) energy: [f32; MAX_NPARTICLE],
    pub(crate) alphas: f64,
    pub(crate) kf: [i32; MAX_NPARTICLE],
    pub(crate) weight: f64,
    pub(crate) weight2: f64,
    pub(crate) me_wgt: f64,
    pub(crate) me_wgt2: f64,
    pub(crate) x1: f64,
    pub(crate) x2: f64,
    pub(crate) x1p: f64,
    pub(crate) x2p: f64,
    pub(crate) id1: i32,
    pub(crate) id2: i32,
    pub(crate) fac_scale: f64,
    pub(crate) ren_scale: f64,
    pub(crate) nuwgt: i32,
    pub(crate) usr_wgts: [f64; MAX_NWGT],
    /// Tag byte plus terminator, so the slot also reads as a C string
    pub(crate) part: [u8; 2],
    pub(crate) alphas_power: i16,
    pub(crate) alphas_power_char: i8,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self {
            id: 0,
            nparticle: 0,
            px: [0.0; MAX_NPARTICLE],
            py: [0.0; MAX_NPARTICLE],
            pz: [0.0; MAX_NPARTICLE],
            energy: [0.0; MAX_NPARTICLE],
            alphas: 0.0,
            kf: [0; MAX_NPARTICLE],
            weight: 0.0,
            weight2: 0.0,
            me_wgt: 0.0,
            me_wgt2: 0.0,
            x1: 0.0,
            x2: 0.0,
            x1p: 0.0,
            x2p: 0.0,
            id1: 0,
            id2: 0,
            fac_scale: 0.0,
            ren_scale: 0.0,
            nuwgt: 0,
            usr_wgts: [0.0; MAX_NWGT],
            part: [0; 2],
            alphas_power: 0,
            alphas_power_char: 0,
        }
    }

    /// Force the byte after the partition tag to be a terminator
    pub fn terminate_part(&mut self) {
        self.part[1] = 0;
    }

    pub fn nparticle(&self) -> i32 {
        self.nparticle
    }

    pub fn nuwgt(&self) -> i32 {
        self.nuwgt
    }

    /// Copy a validated event into the buffer
    ///
    /// Exactly `nparticle` elements go into each particle slot and exactly
    /// `nuwgt` into the weight slot. Callers check the counts first.
    pub(crate) fn store(&mut self, event: &Event) {
        let n = event.nparticle as usize;
        let w = event.nuwgt as usize;

        self.id = event.id;
        self.nparticle = event.nparticle;
        self.px[..n].copy_from_slice(&event.px[..n]);
        self.py[..n].copy_from_slice(&event.py[..n]);
        self.pz[..n].copy_from_slice(&event.pz[..n]);
        self.energy[..n].copy_from_slice(&event.energy[..n]);
        self.alphas = event.alphas;
        self.kf[..n].copy_from_slice(&event.pdg_code[..n]);
        self.weight = event.weight;
        self.weight2 = event.weight2;
        self.me_wgt = event.me_weight;
        self.me_wgt2 = event.me_weight2;
        self.x1 = event.x1;
        self.x2 = event.x2;
        self.x1p = event.x1p;
        self.x2p = event.x2p;
        self.id1 = event.id1;
        self.id2 = event.id2;
        self.fac_scale = event.fac_scale;
        self.ren_scale = event.ren_scale;
        self.nuwgt = event.nuwgt;
        self.usr_wgts[..w].copy_from_slice(&event.user_weights[..w]);
        self.part[0] = event.part.into();
        self.terminate_part();
        self.alphas_power = event.alphas_power;
    }

    /// Borrow the loaded entry, arrays sized by the loaded counts
    ///
    /// Counts outside `0..=MAX` are clamped, so views are always in bounds;
    /// readers reject such entries before building a view.
    pub(crate) fn view(&self, generation: Generation) -> EventView<'_> {
        let n = self.nparticle.clamp(0, MAX_NPARTICLE as i32) as usize;
        let w = self.nuwgt.clamp(0, MAX_NWGT as i32) as usize;
        let alphas_power = match generation {
            Generation::Current => self.alphas_power,
            Generation::Legacy => i16::from(self.alphas_power_char),
        };

        EventView {
            id: self.id,
            nparticle: self.nparticle,
            px: &self.px[..n],
            py: &self.py[..n],
            pz: &self.pz[..n],
            energy: &self.energy[..n],
            alphas: self.alphas,
            pdg_code: &self.kf[..n],
            weight: self.weight,
            weight2: self.weight2,
            me_weight: self.me_wgt,
            me_weight2: self.me_wgt2,
            x1: self.x1,
            x2: self.x2,
            x1p: self.x1p,
            x2p: self.x2p,
            id1: self.id1,
            id2: self.id2,
            fac_scale: self.fac_scale,
            ren_scale: self.ren_scale,
            nuwgt: self.nuwgt,
            user_weights: &self.usr_wgts[..w],
            part: Part::from(self.part[0]),
            alphas_power,
        }
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Slots for EventBuffer {
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

    fn slot_mut(&mut self, id: SlotId) -> Option<SlotMut<'_>> {
        let slot = match Field::from_slot(id)? {
            Field::Id => SlotMut::Int(&mut self.id),
            Field::NParticle => SlotMut::Int(&mut self.nparticle),
            Field::Px => SlotMut::FloatArray(&mut self.px),
            Field::Py => SlotMut::FloatArray(&mut self.py),
            Field::Pz => SlotMut::FloatArray(&mut self.pz),
            Field::Energy => SlotMut::FloatArray(&mut self.energy),
            Field::Alphas => SlotMut::Double(&mut self.alphas),
            Field::PdgCode => SlotMut::IntArray(&mut self.kf),
            Field::Weight => SlotMut::Double(&mut self.weight),
            Field::Weight2 => SlotMut::Double(&mut self.weight2),
            Field::MeWeight => SlotMut::Double(&mut self.me_wgt),
            Field::MeWeight2 => SlotMut::Double(&mut self.me_wgt2),
            Field::X1 => SlotMut::Double(&mut self.x1),
            Field::X2 => SlotMut::Double(&mut self.x2),
            Field::X1p => SlotMut::Double(&mut self.x1p),
            Field::X2p => SlotMut::Double(&mut self.x2p),
            Field::Id1 => SlotMut::Int(&mut self.id1),
            Field::Id2 => SlotMut::Int(&mut self.id2),
            Field::FacScale => SlotMut::Double(&mut self.fac_scale),
            Field::RenScale => SlotMut::Double(&mut self.ren_scale),
            Field::NUserWeights => SlotMut::Int(&mut self.nuwgt),
            Field::UserWeights => SlotMut::DoubleArray(&mut self.usr_wgts),
            Field::Part => SlotMut::Char(&mut self.part),
            Field::AlphasPower => SlotMut::Short(&mut self.alphas_power),
            Field::AlphasPowerLegacy => SlotMut::Byte(&mut self.alphas_power_char),
        };
        Some(slot)
    }
}
