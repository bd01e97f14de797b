//! Caller-facing event records

use serde::{Deserialize, Serialize};

/// Maximum number of particles per event
pub const MAX_NPARTICLE: usize = 100;
/// Maximum number of user weights per event
pub const MAX_NWGT: usize = 100;

/// One event: particle kinematics, PDF information and weights
///
/// The per-particle arrays must hold exactly `nparticle` entries and
/// `user_weights` exactly `nuwgt` entries; [`Event::push_particle`] and
/// [`Event::push_user_weight`] keep the counts in step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i32,
    pub nparticle: i32,
    pub px: Vec<f32>,
    pub py: Vec<f32>,
    pub pz: Vec<f32>,
    pub energy: Vec<f32>,
    pub alphas: f64,
    pub pdg_code: Vec<i32>,
    pub weight: f64,
    pub weight2: f64,
    pub me_weight: f64,
    pub me_weight2: f64,
    pub x1: f64,
    pub x2: f64,
    pub x1p: f64,
    pub x2p: f64,
    pub id1: i32,
    pub id2: i32,
    pub fac_scale: f64,
    pub ren_scale: f64,
    pub nuwgt: i32,
    pub user_weights: Vec<f64>,
    pub part: Part,
    pub alphas_power: i16,
}

impl Event {
    /// Append a particle with momentum `[E, px, py, pz]`
    pub fn push_particle(&mut self, pdg_code: i32, [energy, px, py, pz]: [f32; 4]) {
        self.energy.push(energy);
        self.px.push(px);
        self.py.push(py);
        self.pz.push(pz);
        self.pdg_code.push(pdg_code);
        self.nparticle += 1;
    }

    /// Append an auxiliary weight
    pub fn push_user_weight(&mut self, weight: f64) {
        self.user_weights.push(weight);
        self.nuwgt += 1;
    }
}

/// Event partition tag, stored as a single byte
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Part {
    /// Born
    #[default]
    B,
    /// Integrated subtraction
    I,
    /// Real emission
    R,
    /// Virtual
    V,
    /// Any other tag byte, kept as is
    Other(u8),
}

impl From<Part> for u8 {
    fn from(p: Part) -> Self {
        use Part::*;
        match p {
            B => b'B',
            I => b'I',
            R => b'R',
            V => b'V',
            Other(b) => b,
        }
    }
}

impl From<u8> for Part {
    fn from(b: u8) -> Self {
        match b {
            b'B' => Part::B,
            b'I' => Part::I,
            b'R' => Part::R,
            b'V' => Part::V,
            other => Part::Other(other),
        }
    }
}

/// An event borrowed from a reader's buffer
///
/// Array fields are sized by the loaded, validated counts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventView<'a> {
    pub id: i32,
    pub nparticle: i32,
    pub px: &'a [f32],
    pub py: &'a [f32],
    pub pz: &'a [f32],
    pub energy: &'a [f32],
    pub alphas: f64,
    pub pdg_code: &'a [i32],
    pub weight: f64,
    pub weight2: f64,
    pub me_weight: f64,
    pub me_weight2: f64,
    pub x1: f64,
    pub x2: f64,
    pub x1p: f64,
    pub x2p: f64,
    pub id1: i32,
    pub id2: i32,
    pub fac_scale: f64,
    pub ren_scale: f64,
    pub nuwgt: i32,
    pub user_weights: &'a [f64],
    pub part: Part,
    pub alphas_power: i16,
}

impl From<EventView<'_>> for Event {
    fn from(v: EventView<'_>) -> Self {
        Self {
            id: v.id,
            nparticle: v.nparticle,
            px: v.px.to_vec(),
            py: v.py.to_vec(),
            pz: v.pz.to_vec(),
            energy: v.energy.to_vec(),
            alphas: v.alphas,
            pdg_code: v.pdg_code.to_vec(),
            weight: v.weight,
            weight2: v.weight2,
            me_weight: v.me_weight,
            me_weight2: v.me_weight2,
            x1: v.x1,
            x2: v.x2,
            x1p: v.x1p,
            x2p: v.x2p,
            id1: v.id1,
            id2: v.id2,
            fac_scale: v.fac_scale,
            ren_scale: v.ren_scale,
            nuwgt: v.nuwgt,
            user_weights: v.user_weights.to_vec(),
            part: v.part,
            alphas_power: v.alphas_power,
        }
    }
}
