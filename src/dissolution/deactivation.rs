//! Scheduled surface deactivation.
//!
//! At `start_cycle` a fraction of the exposed voxels of one phase get the face
//! bits toward their pore neighbors set, which hides those faces from the
//! dissolution pass. From `reactivation_cycle` on, each blocked voxel clears
//! its mask with probability `reactivation_rate` per cycle.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::lattice::{face_bit, Lattice, FACE_MASK, FACE_OFFSETS};
use crate::phase::Phase;
use crate::state::SimRng;

use super::wrapped;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeactivationConfig {
    pub phase: Phase,
    pub start_cycle: u32,
    /// Share of exposed voxels deactivated at `start_cycle`.
    pub fraction: f64,
    #[serde(default)]
    pub reactivation_cycle: Option<u32>,
    /// Per-cycle chance that a deactivated voxel reopens.
    #[serde(default)]
    pub reactivation_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeactivationReport {
    pub deactivated: usize,
    pub reactivated: usize,
}

/// Face bits of `idx` that open onto saturated pore space. Neighbors wrap the
/// same way as in the exposure test of the dissolution pass.
fn exposed_faces(lattice: &Lattice, idx: usize) -> u8 {
    let mut mask = 0;
    for d in FACE_OFFSETS {
        if lattice.phase[wrapped(lattice, idx, d)].is_saturated_pore() {
            let axis = d.iter().position(|&c| c != 0).unwrap_or(0);
            mask |= face_bit(axis, d[axis] > 0);
        }
    }
    mask
}

/// Apply every schedule entry due at `cycle`.
pub fn apply_schedule(
    lattice: &mut Lattice,
    rng: &mut SimRng,
    schedule: &[DeactivationConfig],
    cycle: u32,
) -> DeactivationReport {
    let mut report = DeactivationReport::default();
    for entry in schedule {
        if cycle == entry.start_cycle {
            let mut count = 0;
            for idx in 0..lattice.len() {
                if lattice.phase[idx] != entry.phase {
                    continue;
                }
                let faces = exposed_faces(lattice, idx);
                if faces != 0 && rng.gen::<f64>() < entry.fraction {
                    lattice.set_flag(idx, faces);
                    count += 1;
                }
            }
            info!(phase = %entry.phase, cycle, voxels = count, "surfaces deactivated");
            report.deactivated += count;
        }

        let reopening = entry.reactivation_cycle.map_or(false, |c| cycle >= c);
        if reopening && entry.reactivation_rate > 0.0 {
            for idx in 0..lattice.len() {
                if lattice.phase[idx] == entry.phase
                    && lattice.has_flag(idx, FACE_MASK)
                    && rng.gen::<f64>() < entry.reactivation_rate
                {
                    lattice.clear_flag(idx, FACE_MASK);
                    report.reactivated += 1;
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dissolution::is_exposed;
    use crate::lattice::Neighborhood;
    use rand::SeedableRng;

    #[test]
    fn test_full_deactivation_and_reactivation() {
        let mut lat = Lattice::new(5, 5, 5, 1.0);
        let center = lat.index(2, 2, 2);
        lat.phase[center] = Phase::C3A;
        let mut rng = SimRng::seed_from_u64(3);
        let schedule = [DeactivationConfig {
            phase: Phase::C3A,
            start_cycle: 2,
            fraction: 1.0,
            reactivation_cycle: Some(4),
            reactivation_rate: 1.0,
        }];

        assert_eq!(apply_schedule(&mut lat, &mut rng, &schedule, 1).deactivated, 0);
        let r = apply_schedule(&mut lat, &mut rng, &schedule, 2);
        assert_eq!(r.deactivated, 1);
        assert_eq!(lat.flags[center] & FACE_MASK, FACE_MASK);
        assert!(lat.face_blocked(center, [1, 1, 0]));

        let r = apply_schedule(&mut lat, &mut rng, &schedule, 4);
        assert_eq!(r.reactivated, 1);
        assert_eq!(lat.flags[center] & FACE_MASK, 0);
    }

    #[test]
    fn test_only_pore_facing_sides_block() {
        let mut lat = Lattice::new(5, 5, 5, 1.0);
        let center = lat.index(2, 2, 2);
        lat.phase[center] = Phase::C3A;
        let west = lat.index(1, 2, 2);
        lat.phase[west] = Phase::Inert;
        let faces = exposed_faces(&lat, center);
        assert_eq!(faces & face_bit(0, false), 0);
        assert_ne!(faces & face_bit(0, true), 0);
    }

    #[test]
    fn test_blocked_face_across_z_boundary_hides_voxel() {
        // the only pore neighbor of the bottom voxel is across the periodic z face
        let mut lat = Lattice::new(3, 3, 3, 1.0);
        lat.phase.fill(Phase::C3A);
        let pore = lat.index(1, 1, 2);
        lat.phase[pore] = Phase::Porosity;
        let bottom = lat.index(1, 1, 0);
        assert_eq!(exposed_faces(&lat, bottom), face_bit(2, false));
        assert!(is_exposed(&lat, bottom, Neighborhood::TwentySix));

        let mut rng = SimRng::seed_from_u64(5);
        let schedule = [DeactivationConfig {
            phase: Phase::C3A,
            start_cycle: 1,
            fraction: 1.0,
            reactivation_cycle: None,
            reactivation_rate: 0.0,
        }];
        apply_schedule(&mut lat, &mut rng, &schedule, 1);
        assert!(!is_exposed(&lat, bottom, Neighborhood::TwentySix));
        assert!(!is_exposed(&lat, lat.index(1, 1, 1), Neighborhood::TwentySix));
    }
}
