//! Phase counters and per-layer accumulators.
//!
//! Global per-phase counts are kept in step with the lattice through
//! [`PhaseCounters::assign`], the only path by which passes change a voxel's
//! phase. Once per cycle [`PhaseCounters::rebuild`] recomputes everything from
//! the lattice with a rayon reduction over z-layers and refreshes the layer
//! summaries (reacted voxels, gel porosity, mass density).

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::lattice::{Axis, CrackShift, Lattice};
use crate::phase::{properties, Phase, PhaseClass};

/// Gel porosity of C-S-H as a function of age: `a * exp(-age / b)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CshAging {
    /// Gel porosity of freshly formed C-S-H (`a`).
    pub initial_gel_porosity: f64,
    /// Aging time constant in cycles (`b`).
    pub decay_cycles: f64,
}

impl Default for CshAging {
    fn default() -> Self {
        Self {
            initial_gel_porosity: 0.38,
            decay_cycles: 5000.0,
        }
    }
}

impl CshAging {
    #[inline]
    pub fn gel_porosity(&self, age_cycles: u32) -> f64 {
        if self.decay_cycles <= 0.0 {
            return self.initial_gel_porosity;
        }
        self.initial_gel_porosity * (-(age_cycles as f64) / self.decay_cycles).exp()
    }
}

/// Per-layer diagnostics refreshed by [`PhaseCounters::rebuild`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayerSummary {
    /// Reactant voxels consumed since the first cycle.
    pub reacted: u64,
    /// Mean gel porosity contributed by C-S-H, per layer voxel.
    pub gel_porosity: f64,
    /// Mass density [g/cm³] with saturated pores.
    pub mass_density: f64,
}

pub struct PhaseCounters {
    counts: [u64; Phase::COUNT],
    original: Option<[u64; Phase::COUNT]>,
    /// Voxel count per (layer, phase), from the last rebuild.
    layer_counts: Array2<u32>,
    layer_original: Option<Array2<u32>>,
    pub layers: Vec<LayerSummary>,
    /// Extension voxels that found no room, per (layer, phase).
    strain: Array2<u64>,
    total: usize,
}

fn layer_histograms(lattice: &Lattice) -> Array2<u32> {
    let nz = lattice.extent(Axis::Z);
    let rows: Vec<[u32; Phase::COUNT]> = lattice
        .phase
        .par_chunks(lattice.layer_len())
        .map(|layer| {
            let mut hist = [0u32; Phase::COUNT];
            for p in layer {
                hist[p.index()] += 1;
            }
            hist
        })
        .collect();

    let mut out = Array2::zeros((nz, Phase::COUNT));
    for (z, row) in rows.iter().enumerate() {
        for (p, &c) in row.iter().enumerate() {
            out[[z, p]] = c;
        }
    }
    out
}

fn column_sums(layers: &Array2<u32>) -> [u64; Phase::COUNT] {
    let mut counts = [0u64; Phase::COUNT];
    for row in layers.rows() {
        for (p, &c) in row.iter().enumerate() {
            counts[p] += c as u64;
        }
    }
    counts
}

impl PhaseCounters {
    pub fn from_lattice(lattice: &Lattice) -> Self {
        let layer_counts = layer_histograms(lattice);
        let counts = column_sums(&layer_counts);
        let nz = lattice.extent(Axis::Z);
        Self {
            counts,
            original: None,
            layer_counts,
            layer_original: None,
            layers: vec![LayerSummary::default(); nz],
            strain: Array2::zeros((nz, Phase::COUNT)),
            total: lattice.len(),
        }
    }

    #[inline]
    pub fn count(&self, phase: Phase) -> u64 {
        self.counts[phase.index()]
    }

    #[inline]
    pub fn counts(&self) -> &[u64; Phase::COUNT] {
        &self.counts
    }

    /// Total voxel count of the lattice these counters describe.
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn sum(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn volume_fraction(&self, phase: Phase) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(phase) as f64 / self.total as f64
    }

    /// Count of `phase` in layer `z` as of the last rebuild.
    pub fn layer_count(&self, z: usize, phase: Phase) -> u32 {
        self.layer_counts[[z, phase.index()]]
    }

    /// Reassign voxel `idx` to `phase`, keeping counts consistent.
    /// Returns the phase it held before.
    #[inline]
    pub fn assign(&mut self, lattice: &mut Lattice, idx: usize, phase: Phase) -> Phase {
        let old = lattice.phase[idx];
        if old != phase {
            self.counts[old.index()] -= 1;
            self.counts[phase.index()] += 1;
            lattice.phase[idx] = phase;
        }
        old
    }

    /// Freeze the current lattice as the reference for reacted counts.
    pub fn establish_original(&mut self, lattice: &Lattice) {
        let layers = layer_histograms(lattice);
        self.original = Some(column_sums(&layers));
        self.layer_original = Some(layers);
    }

    #[inline]
    pub fn has_original(&self) -> bool {
        self.original.is_some()
    }

    pub fn original(&self, phase: Phase) -> u64 {
        self.original.map_or(0, |o| o[phase.index()])
    }

    /// Voxels of `phase` consumed since the reference was frozen.
    pub fn reacted(&self, phase: Phase) -> u64 {
        self.original(phase).saturating_sub(self.count(phase))
    }

    /// Recompute counts and layer summaries from the lattice.
    pub fn rebuild(&mut self, lattice: &Lattice, cycle: u32, aging: &CshAging) {
        let layer_counts = layer_histograms(lattice);
        let counts = column_sums(&layer_counts);
        if counts != self.counts {
            warn!(cycle, "phase counts drifted from lattice; adopting rebuilt counts");
        }
        self.counts = counts;
        self.total = lattice.len();

        let layer_len = lattice.layer_len();
        let gel: Vec<f64> = lattice
            .phase
            .par_chunks(layer_len)
            .zip(lattice.age.par_chunks(layer_len))
            .map(|(phases, ages)| {
                let sum: f64 = phases
                    .iter()
                    .zip(ages)
                    .filter(|(p, _)| p.is_csh())
                    .map(|(_, &age)| aging.gel_porosity(cycle.saturating_sub(age)))
                    .sum();
                sum / layer_len as f64
            })
            .collect();

        self.layers = layer_counts
            .rows()
            .into_iter()
            .enumerate()
            .map(|(z, row)| {
                let mass: f64 = row
                    .iter()
                    .enumerate()
                    .map(|(p, &c)| c as f64 * properties(Phase::ALL[p]).specific_gravity)
                    .sum();
                let reacted = match &self.layer_original {
                    Some(orig) => Phase::ALL
                        .iter()
                        .filter(|p| p.class() == PhaseClass::Reactant)
                        .map(|p| {
                            let i = p.index();
                            (orig[[z, i]] as u64).saturating_sub(row[i] as u64)
                        })
                        .sum(),
                    None => 0,
                };
                LayerSummary {
                    reacted,
                    gel_porosity: gel[z],
                    mass_density: mass / layer_len as f64,
                }
            })
            .collect();
        self.layer_counts = layer_counts;
    }

    pub fn record_strain(&mut self, layer: usize, phase: Phase) {
        self.strain[[layer, phase.index()]] += 1;
    }

    pub fn strain(&self, phase: Phase) -> u64 {
        self.strain.column(phase.index()).sum()
    }

    pub fn strain_total(&self) -> u64 {
        self.strain.sum()
    }

    /// Resize layer arrays and recount after a crack opened.
    pub fn apply_crack(&mut self, shift: &CrackShift, lattice: &Lattice) {
        let nz = lattice.extent(Axis::Z);
        if shift.axis == Axis::Z {
            self.strain = insert_layers(&self.strain, shift, nz);
            self.layer_original = self
                .layer_original
                .as_ref()
                .map(|orig| insert_layers(orig, shift, nz));
        }
        self.layer_counts = layer_histograms(lattice);
        self.counts = column_sums(&self.layer_counts);
        self.total = lattice.len();
        self.layers.resize(nz, LayerSummary::default());
    }

    // --- Derived bulk quantities, all normalized per gram of starting solids ---

    fn mass_weighted<F>(&self, phases: &[Phase], weight: F) -> f64
    where
        F: Fn(Phase) -> f64,
    {
        phases
            .iter()
            .map(|&p| self.reacted(p) as f64 * properties(p).specific_gravity * weight(p))
            .sum()
    }

    /// Mass of all starting reactants, in g per voxel-cm³.
    pub fn cement_mass(&self) -> f64 {
        Phase::ALL
            .iter()
            .filter(|p| p.class() == PhaseClass::Reactant)
            .map(|&p| self.original(p) as f64 * properties(p).specific_gravity)
            .sum()
    }

    /// Mass-weighted degree of hydration of the clinker phases.
    pub fn degree_of_hydration(&self) -> f64 {
        let initial: f64 = Phase::CLINKER
            .iter()
            .map(|&p| self.original(p) as f64 * properties(p).specific_gravity)
            .sum();
        if initial <= 0.0 {
            return 0.0;
        }
        self.mass_weighted(&Phase::CLINKER, |_| 1.0) / initial
    }

    fn reactants() -> impl Iterator<Item = Phase> {
        Phase::ALL
            .into_iter()
            .filter(|p| p.class() == PhaseClass::Reactant)
    }

    /// Cumulative heat release [J/g of starting reactants].
    pub fn heat_released(&self) -> f64 {
        let mass = self.cement_mass();
        if mass <= 0.0 {
            return 0.0;
        }
        let reactants: Vec<Phase> = Self::reactants().collect();
        self.mass_weighted(&reactants, |p| properties(p).heat_of_hydration) / mass
    }

    /// Chemical shrinkage volume in voxel units.
    pub fn shrinkage_voxels(&self) -> f64 {
        let reactants: Vec<Phase> = Self::reactants().collect();
        self.mass_weighted(&reactants, |p| properties(p).chemical_shrinkage)
    }

    /// Chemical shrinkage [mL/g of starting reactants].
    pub fn chemical_shrinkage(&self) -> f64 {
        let mass = self.cement_mass();
        if mass <= 0.0 {
            return 0.0;
        }
        self.shrinkage_voxels() / mass
    }
}

fn insert_layers<T: Copy + Default>(src: &Array2<T>, shift: &CrackShift, nz: usize) -> Array2<T> {
    let mut out = Array2::from_elem((nz, src.ncols()), T::default());
    for (z, row) in src.rows().into_iter().enumerate() {
        let nzi = if z >= shift.at { z + shift.width } else { z };
        out.row_mut(nzi).assign(&row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_lattice() -> Lattice {
        let mut lat = Lattice::new(4, 4, 4, 1.0);
        for idx in 0..lat.len() {
            lat.phase[idx] = match idx % 4 {
                0 => Phase::C3S,
                1 => Phase::C2S,
                2 => Phase::Gypsum,
                _ => Phase::Porosity,
            };
        }
        lat
    }

    #[test]
    fn test_counts_sum_to_total() {
        let lat = mixed_lattice();
        let counters = PhaseCounters::from_lattice(&lat);
        assert_eq!(counters.sum(), lat.len() as u64);
        assert_eq!(counters.count(Phase::C3S), 16);
        assert_eq!(counters.layer_count(0, Phase::C3S), 4);
    }

    #[test]
    fn test_assign_keeps_conservation() {
        let mut lat = mixed_lattice();
        let mut counters = PhaseCounters::from_lattice(&lat);
        let old = counters.assign(&mut lat, 0, Phase::Csh);
        assert_eq!(old, Phase::C3S);
        assert_eq!(counters.count(Phase::C3S), 15);
        assert_eq!(counters.count(Phase::Csh), 1);
        assert_eq!(counters.sum(), lat.len() as u64);
        // no-op reassignment
        counters.assign(&mut lat, 0, Phase::Csh);
        assert_eq!(counters.count(Phase::Csh), 1);
    }

    #[test]
    fn test_degree_of_hydration() {
        let mut lat = mixed_lattice();
        let mut counters = PhaseCounters::from_lattice(&lat);
        counters.establish_original(&lat);
        assert_eq!(counters.degree_of_hydration(), 0.0);

        // consume every C3S voxel
        for idx in (0..lat.len()).step_by(4) {
            counters.assign(&mut lat, idx, Phase::Porosity);
        }
        let c3s = 16.0 * 3.21;
        let c2s = 16.0 * 3.28;
        let alpha = counters.degree_of_hydration();
        assert!((alpha - c3s / (c3s + c2s)).abs() < 1e-12);
        assert!(counters.heat_released() > 0.0);
        assert!(counters.chemical_shrinkage() > 0.0);
    }

    #[test]
    fn test_rebuild_layers() {
        let mut lat = mixed_lattice();
        let mut counters = PhaseCounters::from_lattice(&lat);
        counters.establish_original(&lat);
        let idx = lat.index(0, 0, 2);
        counters.assign(&mut lat, idx, Phase::Csh);
        lat.age[idx] = 3;
        let aging = CshAging {
            initial_gel_porosity: 0.4,
            decay_cycles: 0.0,
        };
        counters.rebuild(&lat, 3, &aging);
        assert_eq!(counters.layers[2].reacted, 1);
        assert_eq!(counters.layers[0].reacted, 0);
        assert!((counters.layers[2].gel_porosity - 0.4 / 16.0).abs() < 1e-12);
        assert!(counters.layers[1].mass_density > 1.0);
    }

    #[test]
    fn test_gel_porosity_decays() {
        let aging = CshAging::default();
        assert!(aging.gel_porosity(0) > aging.gel_porosity(1000));
    }

    #[test]
    fn test_crack_keeps_conservation() {
        let mut lat = mixed_lattice();
        let mut counters = PhaseCounters::from_lattice(&lat);
        counters.establish_original(&lat);
        counters.record_strain(3, Phase::Csh);
        let shift = lat.insert_crack(Axis::Z, 2);
        counters.apply_crack(&shift, &lat);
        assert_eq!(counters.sum(), lat.len() as u64);
        assert_eq!(counters.count(Phase::Crack), 32);
        assert_eq!(counters.strain(Phase::Csh), 1);
        assert_eq!(counters.layers.len(), 6);
    }
}
