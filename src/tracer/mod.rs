//! Tracer pool: the mobile units of dissolved material.
//!
//! Tracers live in an index arena. `slots` holds every tracer ever allocated,
//! `free` recycles dead slots, and `live` lists the slot ids currently walking.
//! Removal from `live` is an O(1) swap-remove. A per-voxel `occupant` map
//! records which slot owns each voxel so that a tracer consumed by another
//! tracer's reaction is detected as stale on its next visit even if a third
//! tracer has since moved onto the same voxel.

use crate::lattice::CrackShift;
use crate::phase::Phase;

/// Sentinel for "no tracer".
pub const NO_TRACER: u32 = u32::MAX;

/// One diffusing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracer {
    /// Flat lattice index.
    pub position: usize,
    /// Diffusing species.
    pub kind: Phase,
    /// Cycle in which the tracer was created.
    pub born: u32,
    /// Pore kind under the marker, put back when the tracer moves on.
    pub pore: Phase,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    tracer: Tracer,
    /// Position in `live`, or `NO_TRACER` when the slot is free.
    live_index: u32,
    /// Cleared when the tracer was consumed by someone else's reaction.
    valid: bool,
}

#[derive(Debug, Clone)]
pub struct TracerPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: Vec<u32>,
    occupant: Vec<u32>,
    counts: [usize; Phase::COUNT],
}

impl TracerPool {
    pub fn new(voxels: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: Vec::new(),
            occupant: vec![NO_TRACER; voxels],
            counts: [0; Phase::COUNT],
        }
    }

    /// Number of entries in the live list, stale ones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Valid tracers of `kind`.
    #[inline]
    pub fn count(&self, kind: Phase) -> usize {
        self.counts[kind.index()]
    }

    /// Valid tracers of every kind.
    pub fn valid_count(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Add a tracer and return its slot id.
    pub fn spawn(&mut self, tracer: Tracer) -> u32 {
        let live_index = self.live.len() as u32;
        let slot = Slot {
            tracer,
            live_index,
            valid: true,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id as usize] = slot;
                id
            }
            None => {
                self.slots.push(slot);
                (self.slots.len() - 1) as u32
            }
        };
        self.live.push(id);
        self.occupant[tracer.position] = id;
        self.counts[tracer.kind.index()] += 1;
        id
    }

    /// Slot id at position `i` of the live list.
    #[inline]
    pub fn live_at(&self, i: usize) -> u32 {
        self.live[i]
    }

    #[inline]
    pub fn get(&self, id: u32) -> &Tracer {
        &self.slots[id as usize].tracer
    }

    /// Slot owning voxel `position`, if any.
    #[inline]
    pub fn occupant(&self, position: usize) -> Option<u32> {
        match self.occupant[position] {
            NO_TRACER => None,
            id => Some(id),
        }
    }

    /// A tracer is current while it is valid and still owns its voxel.
    #[inline]
    pub fn is_current(&self, id: u32) -> bool {
        let slot = &self.slots[id as usize];
        slot.valid && self.occupant[slot.tracer.position] == id
    }

    /// Move tracer `id` onto `position`, which held pore kind `pore`.
    pub fn relocate(&mut self, id: u32, position: usize, pore: Phase) {
        let old = self.slots[id as usize].tracer.position;
        if self.occupant[old] == id {
            self.occupant[old] = NO_TRACER;
        }
        let tracer = &mut self.slots[id as usize].tracer;
        tracer.position = position;
        tracer.pore = pore;
        self.occupant[position] = id;
    }

    /// Invalidate whichever tracer owns `position`. The slot stays in the live
    /// list until its next visit discards it.
    pub fn evict(&mut self, position: usize) -> Option<Tracer> {
        let id = self.occupant(position)?;
        self.occupant[position] = NO_TRACER;
        let slot = &mut self.slots[id as usize];
        if slot.valid {
            slot.valid = false;
            self.counts[slot.tracer.kind.index()] -= 1;
        }
        Some(slot.tracer)
    }

    /// Swap-remove entry `i` of the live list and free its slot.
    pub fn remove_live(&mut self, i: usize) -> Tracer {
        let id = self.live.swap_remove(i);
        if let Some(&moved) = self.live.get(i) {
            self.slots[moved as usize].live_index = i as u32;
        }
        let slot = &mut self.slots[id as usize];
        slot.live_index = NO_TRACER;
        let tracer = slot.tracer;
        if slot.valid {
            slot.valid = false;
            self.counts[tracer.kind.index()] -= 1;
            if self.occupant[tracer.position] == id {
                self.occupant[tracer.position] = NO_TRACER;
            }
        }
        self.free.push(id);
        tracer
    }

    /// Iterate valid tracers in live-list order.
    pub fn iter(&self) -> impl Iterator<Item = &Tracer> + '_ {
        self.live
            .iter()
            .filter(move |&&id| self.is_current(id))
            .map(move |&id| &self.slots[id as usize].tracer)
    }

    /// Follow a crack insertion: shift positions and resize the occupant map.
    pub fn apply_crack(&mut self, shift: &CrackShift, voxels: usize) {
        let mut occupant = vec![NO_TRACER; voxels];
        for &id in &self.live {
            let slot = &mut self.slots[id as usize];
            let owned = self.occupant[slot.tracer.position] == id;
            slot.tracer.position = shift.map(slot.tracer.position);
            if slot.valid && owned {
                occupant[slot.tracer.position] = id;
            }
        }
        self.occupant = occupant;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{Axis, Lattice};

    fn tracer(position: usize, kind: Phase) -> Tracer {
        Tracer {
            position,
            kind,
            born: 1,
            pore: Phase::Porosity,
        }
    }

    #[test]
    fn test_spawn_and_swap_remove() {
        let mut pool = TracerPool::new(64);
        let a = pool.spawn(tracer(1, Phase::DiffCh));
        let b = pool.spawn(tracer(2, Phase::DiffCsh));
        let c = pool.spawn(tracer(3, Phase::DiffCh));
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.count(Phase::DiffCh), 2);

        let removed = pool.remove_live(0);
        assert_eq!(removed.position, 1);
        // last entry swapped into the hole
        assert_eq!(pool.live_at(0), c);
        assert_eq!(pool.live_at(1), b);
        assert_eq!(pool.count(Phase::DiffCh), 1);
        assert_eq!(pool.occupant(1), None);

        // freed slot is recycled
        let d = pool.spawn(tracer(9, Phase::DiffGypsum));
        assert_eq!(d, a);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_eviction_makes_tracer_stale() {
        let mut pool = TracerPool::new(16);
        let a = pool.spawn(tracer(4, Phase::DiffCh));
        assert!(pool.is_current(a));
        pool.evict(4);
        assert!(!pool.is_current(a));
        assert_eq!(pool.count(Phase::DiffCh), 0);

        // another tracer takes the voxel; the evicted one stays stale
        let b = pool.spawn(tracer(4, Phase::DiffCh));
        assert!(pool.is_current(b));
        assert!(!pool.is_current(a));
        pool.remove_live(0);
        assert_eq!(pool.count(Phase::DiffCh), 1);
        assert_eq!(pool.occupant(4), Some(b));
        assert_eq!(pool.iter().count(), 1);
    }

    #[test]
    fn test_relocate_updates_occupancy() {
        let mut pool = TracerPool::new(16);
        let a = pool.spawn(tracer(0, Phase::DiffC3A));
        pool.relocate(a, 5, Phase::Crack);
        assert_eq!(pool.occupant(0), None);
        assert_eq!(pool.occupant(5), Some(a));
        assert_eq!(pool.get(a).position, 5);
        assert_eq!(pool.get(a).pore, Phase::Crack);
    }

    #[test]
    fn test_crack_shift() {
        let mut lat = Lattice::new(4, 2, 2, 1.0);
        let mut pool = TracerPool::new(lat.len());
        let pos = lat.index(3, 1, 0);
        let a = pool.spawn(tracer(pos, Phase::DiffCh));
        let shift = lat.insert_crack(Axis::X, 1);
        pool.apply_crack(&shift, lat.len());
        let moved = pool.get(a).position;
        assert_eq!(lat.coords(moved), [4, 1, 0]);
        assert!(pool.is_current(a));
    }
}
