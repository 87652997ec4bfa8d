//! Capillary water bookkeeping and self-desiccation.
//!
//! Under sealed curing the volume lost to chemical shrinkage cannot be
//! replaced from outside, so saturated pore voxels are emptied, largest pores
//! first. The pore size of a voxel is estimated from how many of its 26
//! neighbors are pore space.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::counters::PhaseCounters;
use crate::lattice::{Lattice, Neighborhood};
use crate::phase::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Curing {
    /// External water refills every shrinkage void.
    #[default]
    Saturated,
    /// No external water; shrinkage empties pores.
    Sealed,
}

/// Empty pore voxels until the emptied volume matches chemical shrinkage.
/// Returns the number of voxels emptied this call.
pub fn self_desiccate(lattice: &mut Lattice, counters: &mut PhaseCounters, curing: Curing) -> usize {
    if curing == Curing::Saturated {
        return 0;
    }
    let empty = counters.count(Phase::EmptyPore) as usize;
    let available = counters.count(Phase::Porosity) as usize;
    let target = (counters.shrinkage_voxels().round().max(0.0) as usize).min(empty + available);
    if target <= empty {
        return 0;
    }
    let need = target - empty;

    let lat = &*lattice;
    let mut candidates: Vec<(u8, usize)> = (0..lat.len())
        .into_par_iter()
        .filter(|&i| lat.phase[i] == Phase::Porosity)
        .map(|i| {
            let pores = lat
                .neighbors(i, Neighborhood::TwentySix)
                .filter(|&(_, n)| lat.phase[n].is_pore())
                .count();
            (pores as u8, i)
        })
        .collect();
    // most pore neighbors first, ties by index
    candidates.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut emptied = 0;
    for &(_, idx) in candidates.iter().take(need) {
        counters.assign(lattice, idx, Phase::EmptyPore);
        emptied += 1;
    }
    debug!(target, emptied, "self-desiccation");
    emptied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hydrated_lattice() -> (Lattice, PhaseCounters) {
        let mut lat = Lattice::new(6, 6, 6, 1.0);
        for idx in 0..lat.len() / 2 {
            lat.phase[idx] = Phase::C3A;
        }
        let mut counters = PhaseCounters::from_lattice(&lat);
        counters.establish_original(&lat);
        // hydrate every C3A voxel into porosity
        for idx in 0..lat.len() / 2 {
            counters.assign(&mut lat, idx, Phase::Porosity);
        }
        (lat, counters)
    }

    #[test]
    fn test_saturated_curing_never_empties() {
        let (mut lat, mut counters) = hydrated_lattice();
        assert_eq!(self_desiccate(&mut lat, &mut counters, Curing::Saturated), 0);
        assert_eq!(counters.count(Phase::EmptyPore), 0);
    }

    #[test]
    fn test_sealed_curing_matches_shrinkage() {
        let (mut lat, mut counters) = hydrated_lattice();
        let target = counters.shrinkage_voxels().round() as u64;
        assert!(target > 0);
        let emptied = self_desiccate(&mut lat, &mut counters, Curing::Sealed);
        assert_eq!(emptied as u64, target);
        assert_eq!(counters.count(Phase::EmptyPore), target);
        // idempotent once the target is met
        assert_eq!(self_desiccate(&mut lat, &mut counters, Curing::Sealed), 0);
        assert_eq!(counters.sum(), lat.len() as u64);
    }
}
