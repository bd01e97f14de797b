//! Conversion to and from HepMC2 events
//!
//! Outgoing particles all hang off a single vertex. The four named event
//! weights travel as the leading HepMC weights, named `""`, `"2"`, `"ME"` and
//! `"ME2"`; user weights follow unnamed.

use hepmc2::event::{EnergyUnit, FourVector, LengthUnit, Particle, PdfInfo, Vertex};

use crate::event::Event;

/// HepMC status code of final-state particles
pub const OUTGOING_STATUS: i32 = 1;

/// Names of the leading HepMC weights, in order
pub const WEIGHT_NAMES: [&str; 4] = ["", "2", "ME", "ME2"];

// any barcode other than the particles' `end_vtx` (0) makes them outgoing
const VERTEX_BARCODE: i32 = 1;

impl From<&Event> for hepmc2::Event {
    fn from(ev: &Event) -> Self {
        let momenta = ev.energy.iter().zip(&ev.px).zip(&ev.py).zip(&ev.pz);
        let particles_out = ev
            .pdg_code
            .iter()
            .zip(momenta)
            .map(|(&id, (((&e, &px), &py), &pz))| {
                let p = [e, px, py, pz].map(f64::from);
                Particle {
                    id,
                    p: FourVector(p),
                    m: 0.,
                    theta: theta(p),
                    phi: phi(p),
                    status: OUTGOING_STATUS,
                    ..Default::default()
                }
            })
            .collect();

        let mut weights = vec![ev.weight, ev.weight2, ev.me_weight, ev.me_weight2];
        weights.extend_from_slice(&ev.user_weights);

        hepmc2::Event {
            number: ev.id,
            scale: ev.ren_scale,
            alpha_qcd: ev.alphas,
            weights,
            weight_names: WEIGHT_NAMES.iter().map(|s| s.to_string()).collect(),
            vertices: vec![Vertex {
                barcode: VERTEX_BARCODE,
                particles_out,
                ..Default::default()
            }],
            pdf_info: PdfInfo {
                parton_id: [ev.id1, ev.id2],
                x: [ev.x1, ev.x2],
                scale: ev.fac_scale,
                ..Default::default()
            },
            energy_unit: EnergyUnit::GEV,
            length_unit: LengthUnit::MM,
            ..Default::default()
        }
    }
}

impl From<&hepmc2::Event> for Event {
    fn from(ev: &hepmc2::Event) -> Self {
        let mut names = ev.weight_names.clone();
        let mut weights = ev.weights.clone();
        // named weights first, most specific name first; the first remaining
        // weight is the event weight and the rest are user weights
        let me_weight2 = take_named(&mut names, &mut weights, "ME2");
        let me_weight = take_named(&mut names, &mut weights, "ME");
        let weight2 = take_named(&mut names, &mut weights, "2");
        let weight = if weights.is_empty() {
            0.
        } else {
            weights.remove(0)
        };

        let mut event = Event {
            id: ev.number,
            alphas: ev.alpha_qcd,
            weight,
            weight2,
            me_weight,
            me_weight2,
            x1: ev.pdf_info.x[0],
            x2: ev.pdf_info.x[1],
            id1: ev.pdf_info.parton_id[0],
            id2: ev.pdf_info.parton_id[1],
            fac_scale: ev.pdf_info.scale,
            ren_scale: ev.scale,
            ..Default::default()
        };

        let outgoing = ev
            .vertices
            .iter()
            .flat_map(|vx| &vx.particles_out)
            .filter(|p| p.status == OUTGOING_STATUS);
        for p in outgoing {
            let [e, px, py, pz] = p.p.0;
            event.push_particle(p.id, [e as f32, px as f32, py as f32, pz as f32]);
        }
        for w in weights {
            event.push_user_weight(w);
        }
        event
    }
}

/// Remove the weight named `name`, or return 0 if there is none
fn take_named(names: &mut Vec<String>, weights: &mut Vec<f64>, name: &str) -> f64 {
    match names.iter().position(|n| n == name) {
        Some(pos) if pos < weights.len() => {
            names.remove(pos);
            weights.remove(pos)
        }
        _ => 0.,
    }
}

fn phi([_, px, py, _]: [f64; 4]) -> f64 {
    py.atan2(px)
}

fn theta([_, px, py, pz]: [f64; 4]) -> f64 {
    px.hypot(py).atan2(pz)
}

#[cfg(all(test, feature = "hepmc2"))]
mod tests {
    use super::*;
    use crate::event::Part;

    fn sample() -> Event {
        let mut event = Event {
            id: 42,
            alphas: 0.118,
            weight: 1.5,
            weight2: 2.25,
            me_weight: -0.5,
            me_weight2: 0.25,
            x1: 0.1,
            x2: 0.2,
            id1: 21,
            id2: -2,
            fac_scale: 91.2,
            ren_scale: 45.6,
            ..Default::default()
        };
        event.push_particle(21, [50.0, 10.0, 20.0, 30.0]);
        event.push_particle(-11, [40.0, -10.0, -20.0, 5.0]);
        event.push_user_weight(7.0);
        event.push_user_weight(8.0);
        event
    }

    #[test]
    fn test_event_layout() {
        let hepmc = hepmc2::Event::from(&sample());
        assert_eq!(hepmc.number, 42);
        assert_eq!(hepmc.scale, 45.6);
        assert_eq!(hepmc.weights, vec![1.5, 2.25, -0.5, 0.25, 7.0, 8.0]);
        assert_eq!(hepmc.weight_names, WEIGHT_NAMES.map(String::from).to_vec());
        assert_eq!(hepmc.pdf_info.parton_id, [21, -2]);
        assert_eq!(hepmc.pdf_info.scale, 91.2);

        assert_eq!(hepmc.vertices.len(), 1);
        let vertex = &hepmc.vertices[0];
        assert_eq!(vertex.barcode, VERTEX_BARCODE);
        assert!(vertex.particles_in.is_empty());
        assert_eq!(vertex.particles_out.len(), 2);
        for p in &vertex.particles_out {
            assert_eq!(p.status, OUTGOING_STATUS);
            assert_ne!(p.end_vtx, vertex.barcode);
        }

        let gluon = &vertex.particles_out[0];
        assert_eq!(gluon.id, 21);
        assert_eq!(gluon.p.0, [50.0, 10.0, 20.0, 30.0]);
        assert!((gluon.phi - 20f64.atan2(10.0)).abs() < 1e-12);
        assert!((gluon.theta - 500f64.sqrt().atan2(30.0)).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip_keeps_hepmc_fields() {
        let event = sample();
        let back = Event::from(&hepmc2::Event::from(&event));
        assert_eq!(back, event);
    }

    #[test]
    fn test_fields_without_hepmc_counterpart_reset() {
        let mut event = sample();
        event.part = Part::V;
        event.alphas_power = 3;
        event.x1p = 0.5;
        let back = Event::from(&hepmc2::Event::from(&event));
        assert_eq!(back.part, Part::B);
        assert_eq!(back.alphas_power, 0);
        assert_eq!(back.x1p, 0.0);
    }

    #[test]
    fn test_weights_taken_by_name() {
        let hepmc = hepmc2::Event {
            weights: vec![10.0, 20.0, 30.0, 40.0, 50.0],
            weight_names: ["ME", "", "ME2", "2"].map(String::from).to_vec(),
            ..Default::default()
        };
        let event = Event::from(&hepmc);
        assert_eq!(event.me_weight2, 30.0);
        assert_eq!(event.me_weight, 10.0);
        assert_eq!(event.weight2, 40.0);
        assert_eq!(event.weight, 20.0);
        assert_eq!(event.user_weights, vec![50.0]);
        assert_eq!(event.nuwgt, 1);
    }

    #[test]
    fn test_unnamed_weights() {
        let hepmc = hepmc2::Event {
            weights: vec![3.0, 4.0],
            ..Default::default()
        };
        let event = Event::from(&hepmc);
        assert_eq!(event.weight, 3.0);
        assert_eq!((event.weight2, event.me_weight, event.me_weight2), (0.0, 0.0, 0.0));
        assert_eq!(event.user_weights, vec![4.0]);

        let empty = Event::from(&hepmc2::Event::default());
        assert_eq!(empty.weight, 0.0);
        assert_eq!(empty.nuwgt, 0);
    }

    #[test]
    fn test_only_outgoing_particles_kept() {
        let particle = |id, status| Particle {
            id,
            p: FourVector([1.0, 0.0, 0.0, 1.0]),
            status,
            ..Default::default()
        };
        let hepmc = hepmc2::Event {
            vertices: vec![
                Vertex {
                    barcode: -1,
                    particles_out: vec![particle(1, OUTGOING_STATUS), particle(23, 2)],
                    ..Default::default()
                },
                Vertex {
                    barcode: -2,
                    particles_in: vec![particle(2, OUTGOING_STATUS)],
                    particles_out: vec![particle(11, OUTGOING_STATUS), particle(-11, OUTGOING_STATUS)],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let event = Event::from(&hepmc);
        assert_eq!(event.nparticle, 3);
        assert_eq!(event.pdg_code, vec![1, 11, -11]);
        assert_eq!(event.energy, vec![1.0; 3]);
    }
}
