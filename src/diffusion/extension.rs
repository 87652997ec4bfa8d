//! Extension placement: extra product voxels near a reaction site.
//!
//! Search order around the origin: the 5×5 patch on its own layer, the patch
//! on the layer above, the patch on the layer below, then random draws over a
//! widening band of layers. Only saturated pore voxels are taken. A product
//! that finds no room is recorded as strain for its layer.

use rand::Rng;

use crate::counters::PhaseCounters;
use crate::dissolution::whole_count;
use crate::lattice::{Axis, Lattice};
use crate::phase::Phase;
use crate::state::SimRng;
use crate::tracer::{Tracer, TracerPool};

/// Half-width of the local patch.
const PATCH: i64 = 2;
/// Random draws per band width in the fallback search.
const RANDOM_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    pub placed: u32,
    pub failed: u32,
}

impl std::ops::AddAssign for Placement {
    fn add_assign(&mut self, rhs: Self) {
        self.placed += rhs.placed;
        self.failed += rhs.failed;
    }
}

/// Random open voxel in the 5×5 patch around `(x, y)` on layer `z`.
fn patch_site(lattice: &Lattice, rng: &mut SimRng, x: i64, y: i64, z: i64) -> Option<usize> {
    let nz = lattice.extent(Axis::Z) as i64;
    if z < 0 || z >= nz {
        return None;
    }
    let mut open = Vec::with_capacity(25);
    for dy in -PATCH..=PATCH {
        for dx in -PATCH..=PATCH {
            let idx = lattice.index_wrapped(x + dx, y + dy, z);
            if lattice.phase[idx].is_saturated_pore() {
                open.push(idx);
            }
        }
    }
    if open.is_empty() {
        None
    } else {
        Some(open[rng.gen_range(0..open.len())])
    }
}

/// Open voxel for one extension product near `origin`.
pub fn find_site(lattice: &Lattice, rng: &mut SimRng, origin: usize) -> Option<usize> {
    let [x, y, z] = lattice.coords(origin);
    let (x, y, z) = (x as i64, y as i64, z as i64);
    for dz in [0, 1, -1] {
        if let Some(site) = patch_site(lattice, rng, x, y, z + dz) {
            return Some(site);
        }
    }

    let [nx, ny, nz] = lattice.dims();
    let mut band = 2usize;
    loop {
        let lo = (z - band as i64).max(0) as usize;
        let hi = ((z + band as i64) as usize).min(nz - 1);
        for _ in 0..RANDOM_ATTEMPTS {
            let idx = lattice.index(
                rng.gen_range(0..nx),
                rng.gen_range(0..ny),
                rng.gen_range(lo..=hi),
            );
            if lattice.phase[idx].is_saturated_pore() {
                return Some(idx);
            }
        }
        if lo == 0 && hi == nz - 1 {
            break;
        }
        band *= 2;
    }

    // exhaustive sweep from a random start
    let n = lattice.len();
    let start = rng.gen_range(0..n);
    (0..n)
        .map(|k| (start + k) % n)
        .find(|&idx| lattice.phase[idx].is_saturated_pore())
}

/// Place `ratio` worth of `product` around `origin`: `floor(ratio)` voxels
/// plus one more with probability `frac(ratio)`. Diffusing products become
/// tracers unless `solidify` is set, in which case their solid form is laid.
#[allow(clippy::too_many_arguments)]
pub fn place_products(
    lattice: &mut Lattice,
    counters: &mut PhaseCounters,
    tracers: &mut TracerPool,
    rng: &mut SimRng,
    origin: usize,
    product: Phase,
    ratio: f64,
    cycle: u32,
    solidify: bool,
) -> Placement {
    let mut out = Placement::default();
    let layer = lattice.coords(origin)[2];
    let laid = if solidify && product.is_diffusing() {
        product.solid_form().unwrap_or(product)
    } else {
        product
    };

    for _ in 0..whole_count(ratio, rng) {
        match find_site(lattice, rng, origin) {
            Some(site) => {
                let pore = lattice.phase[site];
                counters.assign(lattice, site, laid);
                lattice.age[site] = cycle;
                if laid.is_diffusing() {
                    tracers.spawn(Tracer {
                        position: site,
                        kind: laid,
                        born: cycle,
                        pore,
                    });
                }
                out.placed += 1;
            }
            None => {
                counters.record_strain(layer, product);
                out.failed += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn setup(n: usize) -> (Lattice, PhaseCounters, TracerPool, SimRng) {
        let lat = Lattice::new(n, n, n, 1.0);
        let counters = PhaseCounters::from_lattice(&lat);
        let tracers = TracerPool::new(lat.len());
        (lat, counters, tracers, SimRng::seed_from_u64(5))
    }

    #[test]
    fn test_integer_ratio_places_exactly() {
        let (mut lat, mut counters, mut tracers, mut rng) = setup(10);
        let origin = lat.index(5, 5, 5);
        for _ in 0..20 {
            let before = counters.count(Phase::Ettringite);
            let p = place_products(
                &mut lat, &mut counters, &mut tracers, &mut rng,
                origin, Phase::Ettringite, 2.0, 1, false,
            );
            assert_eq!(p, Placement { placed: 2, failed: 0 });
            assert_eq!(counters.count(Phase::Ettringite), before + 2);
        }
    }

    #[test]
    fn test_local_patch_preferred() {
        let (mut lat, mut counters, mut tracers, mut rng) = setup(10);
        let origin = lat.index(5, 5, 5);
        place_products(
            &mut lat, &mut counters, &mut tracers, &mut rng,
            origin, Phase::Csh, 1.0, 1, false,
        );
        let site = lat.phase.iter().position(|&p| p == Phase::Csh).unwrap();
        let [x, y, z] = lat.coords(site);
        assert_eq!(z, 5);
        assert!(x.abs_diff(5) <= 2 && y.abs_diff(5) <= 2);
    }

    #[test]
    fn test_search_falls_back_to_distant_layers() {
        let (mut lat, _, _, mut rng) = setup(6);
        lat.phase.fill(Phase::Inert);
        let far = lat.index(0, 0, 5);
        lat.phase[far] = Phase::Porosity;
        let origin = lat.index(3, 3, 0);
        assert_eq!(find_site(&lat, &mut rng, origin), Some(far));
    }

    #[test]
    fn test_failure_recorded_as_strain() {
        let (mut lat, _, mut tracers, mut rng) = setup(4);
        lat.phase.fill(Phase::Inert);
        let mut counters = PhaseCounters::from_lattice(&lat);
        let p = place_products(
            &mut lat, &mut counters, &mut tracers, &mut rng,
            0, Phase::Afm, 3.0, 1, false,
        );
        assert_eq!(p.failed, 3);
        assert_eq!(counters.strain(Phase::Afm), 3);
    }

    #[test]
    fn test_diffusing_products_spawn_tracers_or_solidify() {
        let (mut lat, mut counters, mut tracers, mut rng) = setup(6);
        let origin = lat.index(2, 2, 2);
        place_products(
            &mut lat, &mut counters, &mut tracers, &mut rng,
            origin, Phase::DiffCh, 1.0, 1, false,
        );
        assert_eq!(tracers.count(Phase::DiffCh), 1);
        place_products(
            &mut lat, &mut counters, &mut tracers, &mut rng,
            origin, Phase::DiffCh, 1.0, 1, true,
        );
        assert_eq!(tracers.count(Phase::DiffCh), 1);
        assert_eq!(counters.count(Phase::Ch), 1);
    }
}
