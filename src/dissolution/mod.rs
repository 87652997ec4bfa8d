// ============================================================================
// Dissolution pass
//
// One scan per cycle. Voxels of a soluble phase in the requested id range
// that touch saturated pore space, or a solid voxel of a different particle,
// are flagged eligible. Each eligible voxel then dissolves with its current
// probability: the site becomes porosity and, unless the phase converts
// straight to porosity, a tracer of the `creates` kind appears next to it.
// Byproduct tracers accumulate fractionally over the pass and are seeded at
// random pore voxels afterwards.
// ============================================================================

mod deactivation;

pub use deactivation::{apply_schedule, DeactivationConfig, DeactivationReport};

use std::ops::RangeInclusive;

use rand::Rng;
use tracing::{debug, warn};

use crate::lattice::{Lattice, Neighborhood, FACE_OFFSETS, FLAG_ELIGIBLE};
use crate::phase::{spec, Creates, Phase};
use crate::state::{SimRng, SimulationState};
use crate::tracer::Tracer;

/// Random draws per byproduct tracer before it counts as unplaced.
const SEED_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DissolutionReport {
    pub eligible: usize,
    pub dissolved: usize,
    /// Primary tracers created next to dissolved voxels.
    pub tracers: usize,
    /// Byproduct tracers seeded at random pore voxels.
    pub byproducts: usize,
    /// Byproduct tracers that found no pore voxel.
    pub unplaced: usize,
}

/// Neighbor `d` away with periodic wrap on every axis.
#[inline]
fn wrapped(lattice: &Lattice, idx: usize, d: [i32; 3]) -> usize {
    let [x, y, z] = lattice.coords(idx);
    lattice.index_wrapped(
        x as i64 + d[0] as i64,
        y as i64 + d[1] as i64,
        z as i64 + d[2] as i64,
    )
}

/// Whether `idx` touches pore space or a foreign particle through an open face.
fn is_exposed(lattice: &Lattice, idx: usize, hood: Neighborhood) -> bool {
    let own = lattice.particle[idx];
    hood.offsets().iter().any(|&d| {
        if lattice.face_blocked(idx, d) {
            return false;
        }
        let n = wrapped(lattice, idx, d);
        let p = lattice.phase[n];
        if p.is_saturated_pore() {
            return true;
        }
        let other = lattice.particle[n];
        p.is_solid() && own != 0 && other != 0 && other != own
    })
}

/// A single voxel with no solid face neighbor.
fn is_floating(lattice: &Lattice, idx: usize) -> bool {
    FACE_OFFSETS
        .iter()
        .all(|&d| !lattice.phase[wrapped(lattice, idx, d)].is_solid())
}

/// Random saturated-pore face neighbor of `idx`, or `idx` itself.
fn tracer_site(lattice: &Lattice, rng: &mut SimRng, idx: usize) -> usize {
    let mut open = [0usize; 6];
    let mut n = 0;
    for &d in &FACE_OFFSETS {
        let next = wrapped(lattice, idx, d);
        if lattice.phase[next].is_saturated_pore() {
            open[n] = next;
            n += 1;
        }
    }
    if n == 0 {
        idx
    } else {
        open[rng.gen_range(0..n)]
    }
}

/// Random saturated pore voxel anywhere in the lattice.
pub fn random_pore(lattice: &Lattice, rng: &mut SimRng) -> Option<usize> {
    if lattice.is_empty() {
        return None;
    }
    (0..SEED_ATTEMPTS)
        .map(|_| rng.gen_range(0..lattice.len()))
        .find(|&i| lattice.phase[i].is_saturated_pore())
}

/// Whole tracers owed for an accumulated fractional amount:
/// `floor(amount)` plus one more with probability `frac(amount)`.
pub fn whole_count(amount: f64, rng: &mut SimRng) -> usize {
    if amount <= 0.0 {
        return 0;
    }
    let whole = amount.floor();
    let frac = amount - whole;
    let extra = frac > 0.0 && rng.gen::<f64>() < frac;
    whole as usize + usize::from(extra)
}

/// Run the dissolution pass over phase ids in `range`.
pub fn dissolve(
    state: &mut SimulationState,
    range: RangeInclusive<u8>,
    hood: Neighborhood,
) -> DissolutionReport {
    let SimulationState {
        lattice,
        counters,
        tracers,
        reaction,
        rng,
        cycle,
        ..
    } = state;
    let cycle = *cycle;
    let mut report = DissolutionReport::default();

    if !counters.has_original() {
        counters.establish_original(lattice);
    }

    // --- Surface identification ---
    for idx in 0..lattice.len() {
        let phase = lattice.phase[idx];
        if range.contains(&phase.id()) && reaction.is_soluble(phase) && is_exposed(lattice, idx, hood)
        {
            lattice.set_flag(idx, FLAG_ELIGIBLE);
            report.eligible += 1;
        }
    }

    // --- Resolution ---
    let mut pending = [0.0f64; Phase::COUNT];
    for idx in 0..lattice.len() {
        if !lattice.has_flag(idx, FLAG_ELIGIBLE) {
            continue;
        }
        lattice.clear_flag(idx, FLAG_ELIGIBLE);
        let phase = lattice.phase[idx];
        let p = reaction.dissolution_probability(phase, is_floating(lattice, idx));
        if rng.gen::<f64>() >= p {
            continue;
        }

        counters.assign(lattice, idx, Phase::Porosity);
        lattice.particle[idx] = 0;
        lattice.face[idx] = 0;
        lattice.age[idx] = cycle;
        lattice.flags[idx] = 0;
        report.dissolved += 1;

        let kind = match reaction.creates[phase.index()] {
            Creates::Tracer(k) => Some(k),
            Creates::Split {
                primary,
                secondary,
                primary_fraction,
            } => Some(if rng.gen::<f64>() < primary_fraction {
                primary
            } else {
                secondary
            }),
            Creates::Porosity | Creates::Nothing => None,
        };
        if let Some(kind) = kind {
            let site = tracer_site(lattice, rng, idx);
            let pore = lattice.phase[site];
            counters.assign(lattice, site, kind);
            lattice.age[site] = cycle;
            tracers.spawn(Tracer {
                position: site,
                kind,
                born: cycle,
                pore,
            });
            report.tracers += 1;
        }

        for &(by, ratio) in spec(phase).byproducts {
            pending[by.index()] += ratio;
        }
    }

    // --- Byproducts ---
    for kind in Phase::ALL {
        let owed = whole_count(pending[kind.index()], rng);
        for _ in 0..owed {
            match random_pore(lattice, rng) {
                Some(site) => {
                    let pore = lattice.phase[site];
                    counters.assign(lattice, site, kind);
                    lattice.age[site] = cycle;
                    tracers.spawn(Tracer {
                        position: site,
                        kind,
                        born: cycle,
                        pore,
                    });
                    report.byproducts += 1;
                }
                None => report.unplaced += 1,
            }
        }
    }
    if report.unplaced > 0 {
        warn!(cycle, unplaced = report.unplaced, "no pore space left for byproduct tracers");
    }

    debug!(
        cycle,
        eligible = report.eligible,
        dissolved = report.dissolved,
        tracers = report.tracers,
        byproducts = report.byproducts,
        "dissolution pass"
    );
    report
}
