//! Aggregate simulation state handed by `&mut` to every pass.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::chemistry::ChemistryState;
use crate::config::HydrationParams;
use crate::counters::PhaseCounters;
use crate::lattice::{Axis, CrackShift, Lattice};
use crate::percolation::PercolationState;
use crate::reaction::ReactionState;
use crate::tracer::TracerPool;

/// Deterministic generator for every stochastic pass.
pub type SimRng = ChaCha8Rng;

pub struct SimulationState {
    pub lattice: Lattice,
    pub counters: PhaseCounters,
    pub tracers: TracerPool,
    pub reaction: ReactionState,
    pub chemistry: ChemistryState,
    pub percolation: PercolationState,
    pub rng: SimRng,
    /// Cycles completed so far.
    pub cycle: u32,
}

impl SimulationState {
    pub fn new(lattice: Lattice, params: &HydrationParams, seed: u64) -> Self {
        let counters = PhaseCounters::from_lattice(&lattice);
        let tracers = TracerPool::new(lattice.len());
        Self {
            counters,
            tracers,
            reaction: ReactionState::new(params),
            chemistry: ChemistryState::default(),
            percolation: PercolationState::default(),
            rng: SimRng::seed_from_u64(seed),
            cycle: 0,
            lattice,
        }
    }

    /// Open a crack slab and shift counters and tracers with it.
    pub fn insert_crack(&mut self, axis: Axis, width: usize) -> CrackShift {
        let shift = self.lattice.insert_crack(axis, width);
        self.counters.apply_crack(&shift, &self.lattice);
        self.tracers.apply_crack(&shift, self.lattice.len());
        info!(
            %axis,
            width,
            at = shift.at,
            dims = ?shift.new_dims,
            "crack inserted"
        );
        shift
    }

    /// Every live tracer sits on a voxel marked with its own kind.
    pub fn tracers_consistent(&self) -> bool {
        self.tracers
            .iter()
            .all(|t| self.lattice.phase[t.position] == t.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;
    use crate::tracer::Tracer;

    #[test]
    fn test_crack_moves_tracers_with_voxels() {
        let lat = Lattice::new(4, 4, 4, 1.0);
        let mut state = SimulationState::new(lat, &HydrationParams::default(), 1);
        let idx = state.lattice.index(1, 1, 3);
        state.counters.assign(&mut state.lattice, idx, Phase::DiffCh);
        state.tracers.spawn(Tracer {
            position: idx,
            kind: Phase::DiffCh,
            born: 0,
            pore: Phase::Porosity,
        });

        state.insert_crack(Axis::Z, 2);
        assert_eq!(state.lattice.dims(), [4, 4, 6]);
        assert!(state.tracers_consistent());
        let moved = state.tracers.iter().next().unwrap().position;
        assert_eq!(state.lattice.coords(moved), [1, 1, 5]);
        assert_eq!(state.counters.sum(), state.lattice.len() as u64);
    }
}
