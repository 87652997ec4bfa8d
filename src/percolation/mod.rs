//! Percolation ("burning") analysis.
//!
//! A burn labels connected clusters of target voxels with a breadth-first
//! flood fill. The burn axis is bounded, the other two are periodic. A
//! cluster spans when it touches both the near face (coordinate 0) and the far
//! face along the burn axis; the connected fraction is the share of target
//! voxels in spanning clusters.
//!
//! The set burn models mechanical percolation of the solid skeleton: steps
//! must alternate between binder and bridging voxels, except that two voxels
//! of the same class and the same originating particle connect directly.

use rayon::prelude::*;
use tracing::info;

use crate::lattice::{Axis, Lattice, FACE_OFFSETS};
use crate::phase::{spec, Phase, SetClass};

/// Outcome of one burn along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurnResult {
    pub axis: Axis,
    pub percolates: bool,
    /// Target voxels in spanning clusters.
    pub connected: usize,
    /// All target voxels.
    pub total: usize,
}

impl BurnResult {
    pub fn connected_fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.connected as f64 / self.total as f64
    }
}

/// Label clusters of `member` voxels joined by `joins` and report spanning.
fn burn_with<M, J>(lattice: &Lattice, axis: Axis, member: M, joins: J) -> BurnResult
where
    M: Fn(usize) -> bool,
    J: Fn(usize, usize) -> bool,
{
    let n = lattice.len();
    let a = axis.index();
    let far = lattice.extent(axis).saturating_sub(1);
    let mut visited = vec![false; n];
    let mut queue: Vec<usize> = Vec::new();
    let mut total = 0;
    let mut connected = 0;

    for seed in 0..n {
        if !member(seed) {
            continue;
        }
        total += 1;
        if visited[seed] {
            continue;
        }

        // flood one cluster
        visited[seed] = true;
        queue.clear();
        queue.push(seed);
        let mut head = 0;
        let (mut near_hit, mut far_hit) = (false, false);
        while head < queue.len() {
            let idx = queue[head];
            head += 1;
            let c = lattice.coords(idx)[a];
            near_hit |= c == 0;
            far_hit |= c == far;
            for &d in &FACE_OFFSETS {
                if let Some(next) = lattice.step_bounded(idx, d, axis) {
                    if !visited[next] && member(next) && joins(idx, next) {
                        visited[next] = true;
                        queue.push(next);
                    }
                }
            }
        }
        if near_hit && far_hit {
            connected += queue.len();
        }
    }

    BurnResult {
        axis,
        percolates: connected > 0,
        connected,
        total,
    }
}

fn mask_of(targets: &[Phase]) -> [bool; Phase::COUNT] {
    let mut mask = [false; Phase::COUNT];
    for p in targets {
        mask[p.index()] = true;
    }
    mask
}

/// Burn through every voxel whose phase is in `targets`.
pub fn burn(lattice: &Lattice, targets: &[Phase], axis: Axis) -> BurnResult {
    let mask = mask_of(targets);
    burn_with(
        lattice,
        axis,
        |i| mask[lattice.phase[i].index()],
        |_, _| true,
    )
}

/// Whether the union of `a` and `b` spans the lattice along `axis`.
pub fn is_percolated(lattice: &Lattice, a: Phase, b: Phase, axis: Axis) -> bool {
    burn(lattice, &[a, b], axis).percolates
}

/// Solid-skeleton burn along `axis`.
pub fn burn_set(lattice: &Lattice, axis: Axis) -> BurnResult {
    let class = |i: usize| spec(lattice.phase[i]).set_class;
    burn_with(
        lattice,
        axis,
        |i| class(i) != SetClass::Neither,
        |u, v| {
            let (cu, cv) = (class(u), class(v));
            if cu != cv {
                return true;
            }
            let p = lattice.particle[u];
            p != 0 && p == lattice.particle[v]
        },
    )
}

/// Phases that make up the capillary pore network.
pub fn pore_phases() -> Vec<Phase> {
    Phase::ALL
        .into_iter()
        .filter(|p| p.is_pore() || p.is_diffusing())
        .collect()
}

/// Percolation history over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PercolationState {
    /// Last pore burn per axis.
    pub pore: Option<[BurnResult; 3]>,
    /// Last set burn per axis.
    pub solid: Option<[BurnResult; 3]>,
    /// First cycle at which the skeleton percolated along all three axes.
    pub set_point: Option<u32>,
    /// First cycle at which pore space stopped percolating.
    pub pore_depercolation: Option<u32>,
}

impl PercolationState {
    /// Pore space percolates when any axis does.
    pub fn pore_percolates(&self) -> bool {
        self.pore
            .map_or(true, |r| r.iter().any(|b| b.percolates))
    }

    /// Set once the skeleton percolates along every axis.
    pub fn is_set(&self) -> bool {
        self.set_point.is_some()
    }

    /// Mean connected fraction of pore space over the three axes.
    pub fn pore_connectivity(&self) -> f64 {
        self.pore.map_or(1.0, |r| {
            r.iter().map(BurnResult::connected_fraction).sum::<f64>() / 3.0
        })
    }

    pub fn solid_connectivity(&self) -> f64 {
        self.solid.map_or(0.0, |r| {
            r.iter().map(BurnResult::connected_fraction).sum::<f64>() / 3.0
        })
    }

    /// Burn pores and skeleton along all three axes.
    pub fn evaluate(&mut self, lattice: &Lattice, cycle: u32) {
        let pores = pore_phases();
        let results: Vec<(BurnResult, BurnResult)> = Axis::ALL
            .par_iter()
            .map(|&axis| (burn(lattice, &pores, axis), burn_set(lattice, axis)))
            .collect();
        let pore = [results[0].0, results[1].0, results[2].0];
        let solid = [results[0].1, results[1].1, results[2].1];

        let was_percolating = self.pore_percolates();
        self.pore = Some(pore);
        self.solid = Some(solid);

        if was_percolating && !self.pore_percolates() && self.pore_depercolation.is_none() {
            self.pore_depercolation = Some(cycle);
            info!(cycle, "capillary pores depercolated");
        }
        if self.set_point.is_none() && solid.iter().all(|b| b.percolates) {
            self.set_point = Some(cycle);
            info!(cycle, "solid skeleton percolates: set point reached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(lat: &mut Lattice, x: usize, y: usize, phase: Phase) {
        let [_, _, nz] = lat.dims();
        for z in 0..nz {
            let idx = lat.index(x, y, z);
            lat.phase[idx] = phase;
        }
    }

    #[test]
    fn test_column_percolates_along_z_only() {
        let mut lat = Lattice::new(5, 5, 5, 1.0);
        lat.phase.fill(Phase::Inert);
        column(&mut lat, 2, 2, Phase::Porosity);
        let z = burn(&lat, &[Phase::Porosity], Axis::Z);
        assert!(z.percolates);
        assert_eq!(z.connected, 5);
        assert_eq!(z.connected_fraction(), 1.0);
        assert!(!burn(&lat, &[Phase::Porosity], Axis::X).percolates);
    }

    #[test]
    fn test_periodic_across_the_burn_axis() {
        // two z segments joined only across the x = 0 / x = 3 seam
        let mut lat = Lattice::new(4, 4, 4, 1.0);
        lat.phase.fill(Phase::Inert);
        for (x, z) in [(0, 0), (0, 1), (3, 1), (3, 2), (3, 3)] {
            let idx = lat.index(x, 0, z);
            lat.phase[idx] = Phase::Porosity;
        }
        assert!(burn(&lat, &[Phase::Porosity], Axis::Z).percolates);
        // probing x bounds the seam
        assert!(!burn(&lat, &[Phase::Porosity], Axis::X).percolates);
    }

    #[test]
    fn test_fraction_counts_only_spanning_clusters() {
        let mut lat = Lattice::new(5, 5, 5, 1.0);
        lat.phase.fill(Phase::Inert);
        column(&mut lat, 0, 0, Phase::Porosity);
        let idx = lat.index(3, 3, 2);
        lat.phase[idx] = Phase::Porosity;
        let r = burn(&lat, &[Phase::Porosity], Axis::Z);
        assert_eq!(r.total, 6);
        assert_eq!(r.connected, 5);
        assert!(is_percolated(&lat, Phase::Porosity, Phase::Crack, Axis::Z));
    }

    #[test]
    fn test_set_burn_requires_alternation() {
        let mut lat = Lattice::new(3, 3, 4, 1.0);
        lat.phase.fill(Phase::Porosity);
        // binder-binder from different (unset) particles does not connect
        column(&mut lat, 1, 1, Phase::C3S);
        assert!(!burn_set(&lat, Axis::Z).percolates);

        // alternate C3S / C-S-H
        for z in [1, 3] {
            let idx = lat.index(1, 1, z);
            lat.phase[idx] = Phase::Csh;
        }
        assert!(burn_set(&lat, Axis::Z).percolates);
    }

    #[test]
    fn test_set_burn_same_particle() {
        let mut lat = Lattice::new(3, 3, 4, 1.0);
        lat.phase.fill(Phase::Porosity);
        column(&mut lat, 1, 1, Phase::C3S);
        for z in 0..4 {
            let idx = lat.index(1, 1, z);
            lat.particle[idx] = 7;
        }
        assert!(burn_set(&lat, Axis::Z).percolates);
    }

    #[test]
    fn test_state_tracks_set_point() {
        let mut lat = Lattice::new(3, 3, 3, 1.0);
        let mut state = PercolationState::default();
        state.evaluate(&lat, 1);
        assert!(state.pore_percolates());
        assert!(!state.is_set());

        lat.phase.fill(Phase::C3S);
        lat.particle.fill(1);
        state.evaluate(&lat, 9);
        assert_eq!(state.set_point, Some(9));
        assert_eq!(state.pore_depercolation, Some(9));
        assert!(!state.pore_percolates());
    }
}
