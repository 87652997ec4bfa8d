//! 3-D voxel lattice.
//!
//! Struct-of-arrays layout: one flat buffer per voxel attribute, all sharing
//! the stride index `x + nx * (y + ny * z)`. Each pass touches only the
//! buffers it needs.
//!
//! Boundaries are periodic in x and y. Along z the lattice is bounded for
//! diffusion and extension placement; percolation picks its own bounded axis.

use serde::{Deserialize, Serialize};

use crate::error::{HydrationError, Result};
use crate::phase::Phase;

/// Lattice axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(s)
    }
}

/// Integer step between voxels.
pub type Offset = [i32; 3];

/// Neighbor offsets: 6 faces, then 12 edges, then 8 corners.
pub const NEIGHBOR_OFFSETS: [Offset; 26] = [
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [0, 0, 1],
    [0, 0, -1],
    [1, 1, 0],
    [1, -1, 0],
    [-1, 1, 0],
    [-1, -1, 0],
    [1, 0, 1],
    [1, 0, -1],
    [-1, 0, 1],
    [-1, 0, -1],
    [0, 1, 1],
    [0, 1, -1],
    [0, -1, 1],
    [0, -1, -1],
    [1, 1, 1],
    [1, 1, -1],
    [1, -1, 1],
    [1, -1, -1],
    [-1, 1, 1],
    [-1, 1, -1],
    [-1, -1, 1],
    [-1, -1, -1],
];

/// Six axis directions, in the order used for face bits.
pub const FACE_OFFSETS: [Offset; 6] = [
    NEIGHBOR_OFFSETS[0],
    NEIGHBOR_OFFSETS[1],
    NEIGHBOR_OFFSETS[2],
    NEIGHBOR_OFFSETS[3],
    NEIGHBOR_OFFSETS[4],
    NEIGHBOR_OFFSETS[5],
];

/// Neighbor set used for surface detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Neighborhood {
    Six,
    Eighteen,
    #[default]
    TwentySix,
}

impl Neighborhood {
    #[inline]
    pub fn offsets(self) -> &'static [Offset] {
        match self {
            Neighborhood::Six => &NEIGHBOR_OFFSETS[..6],
            Neighborhood::Eighteen => &NEIGHBOR_OFFSETS[..18],
            Neighborhood::TwentySix => &NEIGHBOR_OFFSETS[..],
        }
    }
}

// --- Flag bits ---
/// Bits 0..6: deactivated faces (+x, -x, +y, -y, +z, -z).
pub const FACE_MASK: u8 = 0b0011_1111;
/// Voxel was found on a dissolvable surface in the current pass.
pub const FLAG_ELIGIBLE: u8 = 1 << 7;

/// Face bit for one unit step along `axis`.
#[inline]
pub const fn face_bit(axis: usize, positive: bool) -> u8 {
    1 << (2 * axis + if positive { 0 } else { 1 })
}

/// Periodic wrap of a signed coordinate into `0..extent`.
#[inline]
pub fn wrap(coord: i64, extent: usize) -> usize {
    let r = extent as i64;
    (((coord % r) + r) % r) as usize
}

/// The voxel microstructure.
#[derive(Debug, Clone)]
pub struct Lattice {
    nx: usize,
    ny: usize,
    nz: usize,
    /// Edge length of one voxel [µm].
    pub resolution: f64,

    /// Phase id per voxel.
    pub phase: Vec<Phase>,
    /// Originating particle id (0 = none).
    pub particle: Vec<u32>,
    /// Plate orientation for C-S-H: 0 = none, 1..=3 = plate normal along x, y, z.
    pub face: Vec<u8>,
    /// Cycle at which the voxel's current phase formed.
    pub age: Vec<u32>,
    /// Deactivation bits and pass flags.
    pub flags: Vec<u8>,
}

impl Lattice {
    /// All-porosity lattice.
    pub fn new(nx: usize, ny: usize, nz: usize, resolution: f64) -> Self {
        let n = nx * ny * nz;
        Self {
            nx,
            ny,
            nz,
            resolution,
            phase: vec![Phase::Porosity; n],
            particle: vec![0; n],
            face: vec![0; n],
            age: vec![0; n],
            flags: vec![0; n],
        }
    }

    /// Build from a decoded phase buffer in x-fastest order.
    pub fn from_phases(
        nx: usize,
        ny: usize,
        nz: usize,
        resolution: f64,
        phases: Vec<Phase>,
    ) -> Result<Self> {
        let expected = nx * ny * nz;
        if phases.len() != expected {
            return Err(HydrationError::SizeMismatch {
                expected,
                found: phases.len(),
            });
        }
        let mut lattice = Self::new(nx, ny, nz, resolution);
        lattice.phase = phases;
        Ok(lattice)
    }

    /// Attach particle ids read from a companion image.
    pub fn set_particles(&mut self, particles: Vec<u32>) -> Result<()> {
        if particles.len() != self.len() {
            return Err(HydrationError::SizeMismatch {
                expected: self.len(),
                found: particles.len(),
            });
        }
        self.particle = particles;
        Ok(())
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    #[inline]
    pub fn extent(&self, axis: Axis) -> usize {
        self.dims()[axis.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.phase.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.phase.is_empty()
    }

    /// Voxels per z-layer.
    #[inline]
    pub fn layer_len(&self) -> usize {
        self.nx * self.ny
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.nx * (y + self.ny * z)
    }

    #[inline]
    pub fn coords(&self, idx: usize) -> [usize; 3] {
        let x = idx % self.nx;
        let y = (idx / self.nx) % self.ny;
        let z = idx / self.layer_len();
        [x, y, z]
    }

    /// Index of the voxel at signed coordinates, wrapping every axis.
    #[inline]
    pub fn index_wrapped(&self, x: i64, y: i64, z: i64) -> usize {
        self.index(wrap(x, self.nx), wrap(y, self.ny), wrap(z, self.nz))
    }

    /// Step from `idx` by `d`, periodic in the two axes other than `bounded`.
    /// Returns `None` when the step leaves the lattice along `bounded`.
    #[inline]
    pub fn step_bounded(&self, idx: usize, d: Offset, bounded: Axis) -> Option<usize> {
        let c = self.coords(idx);
        let dims = self.dims();
        let mut out = [0usize; 3];
        for a in 0..3 {
            let v = c[a] as i64 + d[a] as i64;
            if a == bounded.index() {
                if v < 0 || v >= dims[a] as i64 {
                    return None;
                }
                out[a] = v as usize;
            } else {
                out[a] = wrap(v, dims[a]);
            }
        }
        Some(self.index(out[0], out[1], out[2]))
    }

    /// Step used by diffusion and extension: periodic in x/y, bounded in z.
    #[inline]
    pub fn offset(&self, idx: usize, d: Offset) -> Option<usize> {
        self.step_bounded(idx, d, Axis::Z)
    }

    /// In-lattice neighbors of `idx` for the given neighborhood.
    pub fn neighbors(
        &self,
        idx: usize,
        hood: Neighborhood,
    ) -> impl Iterator<Item = (Offset, usize)> + '_ {
        hood.offsets()
            .iter()
            .filter_map(move |&d| self.offset(idx, d).map(|n| (d, n)))
    }

    // --- Flag helpers ---
    #[inline]
    pub fn has_flag(&self, idx: usize, flag: u8) -> bool {
        self.flags[idx] & flag != 0
    }

    #[inline]
    pub fn set_flag(&mut self, idx: usize, flag: u8) {
        self.flags[idx] |= flag;
    }

    #[inline]
    pub fn clear_flag(&mut self, idx: usize, flag: u8) {
        self.flags[idx] &= !flag;
    }

    /// Whether a step along `d` leaves through a deactivated face.
    #[inline]
    pub fn face_blocked(&self, idx: usize, d: Offset) -> bool {
        let mask = self.flags[idx] & FACE_MASK;
        if mask == 0 {
            return false;
        }
        (0..3).any(|a| d[a] != 0 && mask & face_bit(a, d[a] > 0) != 0)
    }

    /// Count of voxels in `phase`.
    pub fn count(&self, phase: Phase) -> usize {
        self.phase.iter().filter(|&&p| p == phase).count()
    }

    /// Insert a slab of crack porosity `width` voxels thick, perpendicular to
    /// `axis` at the midplane. Every attribute buffer is rebuilt at the new
    /// size; the returned shift maps old indices to new ones.
    pub fn insert_crack(&mut self, axis: Axis, width: usize) -> CrackShift {
        let old_dims = self.dims();
        let at = old_dims[axis.index()] / 2;
        let mut new_dims = old_dims;
        new_dims[axis.index()] += width;
        let shift = CrackShift {
            axis,
            at,
            width,
            old_dims,
            new_dims,
        };

        let n = new_dims[0] * new_dims[1] * new_dims[2];
        let mut phase = vec![Phase::Crack; n];
        let mut particle = vec![0; n];
        let mut face = vec![0; n];
        let mut age = vec![0; n];
        let mut flags = vec![0; n];

        for old in 0..self.len() {
            let new = shift.map(old);
            phase[new] = self.phase[old];
            particle[new] = self.particle[old];
            face[new] = self.face[old];
            age[new] = self.age[old];
            flags[new] = self.flags[old];
        }

        self.nx = new_dims[0];
        self.ny = new_dims[1];
        self.nz = new_dims[2];
        self.phase = phase;
        self.particle = particle;
        self.face = face;
        self.age = age;
        self.flags = flags;
        shift
    }
}

/// Index remapping produced by [`Lattice::insert_crack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrackShift {
    pub axis: Axis,
    /// First coordinate along `axis` occupied by the crack.
    pub at: usize,
    pub width: usize,
    pub old_dims: [usize; 3],
    pub new_dims: [usize; 3],
}

impl CrackShift {
    /// New flat index of the voxel that sat at `old` before the crack opened.
    #[inline]
    pub fn map(&self, old: usize) -> usize {
        let [nx, ny, _] = self.old_dims;
        let mut c = [old % nx, (old / nx) % ny, old / (nx * ny)];
        let a = self.axis.index();
        if c[a] >= self.at {
            c[a] += self.width;
        }
        c[0] + self.new_dims[0] * (c[1] + self.new_dims[1] * c[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periodic_wrapping() {
        assert_eq!(wrap(16, 16), 0);
        assert_eq!(wrap(17, 16), 1);
        assert_eq!(wrap(-1, 16), 15);
        assert_eq!(wrap(-17, 16), 15);
    }

    #[test]
    fn test_index_roundtrip() {
        let lat = Lattice::new(4, 5, 6, 1.0);
        for idx in 0..lat.len() {
            let [x, y, z] = lat.coords(idx);
            assert_eq!(lat.index(x, y, z), idx);
        }
        assert_eq!(lat.layer_len(), 20);
    }

    #[test]
    fn test_offset_wraps_xy_but_not_z() {
        let lat = Lattice::new(4, 4, 4, 1.0);
        let corner = lat.index(0, 0, 0);
        assert_eq!(lat.offset(corner, [-1, 0, 0]), Some(lat.index(3, 0, 0)));
        assert_eq!(lat.offset(corner, [0, -1, 0]), Some(lat.index(0, 3, 0)));
        assert_eq!(lat.offset(corner, [0, 0, -1]), None);
        assert_eq!(
            lat.step_bounded(corner, [0, 0, -1], Axis::X),
            Some(lat.index(0, 0, 3))
        );
        assert_eq!(lat.step_bounded(corner, [-1, 0, 0], Axis::X), None);
    }

    #[test]
    fn test_neighborhood_sizes() {
        let lat = Lattice::new(5, 5, 5, 1.0);
        let center = lat.index(2, 2, 2);
        assert_eq!(lat.neighbors(center, Neighborhood::Six).count(), 6);
        assert_eq!(lat.neighbors(center, Neighborhood::Eighteen).count(), 18);
        assert_eq!(lat.neighbors(center, Neighborhood::TwentySix).count(), 26);
        // bottom layer loses the nine voxels below it
        let bottom = lat.index(2, 2, 0);
        assert_eq!(lat.neighbors(bottom, Neighborhood::TwentySix).count(), 17);
    }

    #[test]
    fn test_face_blocking() {
        let mut lat = Lattice::new(3, 3, 3, 1.0);
        let idx = lat.index(1, 1, 1);
        lat.set_flag(idx, face_bit(0, true));
        assert!(lat.face_blocked(idx, [1, 0, 0]));
        assert!(lat.face_blocked(idx, [1, 1, 0]));
        assert!(!lat.face_blocked(idx, [-1, 0, 0]));
        lat.set_flag(idx, FLAG_ELIGIBLE);
        assert!(!lat.face_blocked(idx, [0, 1, 0]));
        lat.clear_flag(idx, FLAG_ELIGIBLE);
        assert!(!lat.has_flag(idx, FLAG_ELIGIBLE));
    }

    #[test]
    fn test_crack_insertion_shifts_slabs() {
        let mut lat = Lattice::new(4, 3, 2, 1.0);
        let before = lat.index(3, 1, 1);
        lat.phase[before] = Phase::C3S;
        lat.particle[before] = 7;
        let low = lat.index(1, 2, 0);
        lat.phase[low] = Phase::Ch;

        let shift = lat.insert_crack(Axis::X, 2);
        assert_eq!(lat.dims(), [6, 3, 2]);
        assert_eq!(lat.len(), 36);

        let after = shift.map(before);
        assert_eq!(lat.coords(after), [5, 1, 1]);
        assert_eq!(lat.phase[after], Phase::C3S);
        assert_eq!(lat.particle[after], 7);
        assert_eq!(lat.coords(shift.map(low)), [1, 2, 0]);
        assert_eq!(lat.count(Phase::Crack), 2 * 3 * 2);
    }
}
