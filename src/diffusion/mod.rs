// ============================================================================
// Diffusion-reaction engine
//
// Each step visits every live tracer once and tries a single face move:
//
//   destination is saturated pore  → nucleate (probability, or forced on the
//                                    final step) or move
//   destination has a reaction rule → react, consume the tracer, extend
//   otherwise                       → stay
//
// The live list is walked from the back. Swap-remove pulls an already
// visited (or newly spawned) tracer into the hole, so nothing is visited
// twice and tracers spawned during the step wait for the next one.
// ============================================================================

pub mod extension;
pub mod rules;

use rand::Rng;
use tracing::debug;

use crate::config::{HydrationParams, Nucleation};
use crate::lattice::{Offset, FACE_OFFSETS};
use crate::phase::Phase;
use crate::state::SimulationState;

use extension::{place_products, Placement};
use rules::{nucleation_extension, rule_for, Condition, ReactionRule, CSH_SORPTION_CAPACITY};

/// Nucleation laws per diffusing species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NucleationTable {
    pub ch: Nucleation,
    pub gypsum: Nucleation,
    pub c3ah6: Nucleation,
    pub fh3: Nucleation,
}

impl NucleationTable {
    pub fn from_params(params: &HydrationParams) -> Self {
        Self {
            ch: params.nucleation_ch,
            gypsum: params.nucleation_gypsum,
            c3ah6: params.nucleation_c3ah6,
            fh3: params.nucleation_fh3,
        }
    }

    /// Law for `kind`, or `None` if it only precipitates on contact.
    pub fn law(&self, kind: Phase) -> Option<Nucleation> {
        match kind {
            Phase::DiffCh => Some(self.ch),
            Phase::DiffGypsum | Phase::DiffSo4 | Phase::DiffAnhydrite | Phase::DiffHemihydrate => {
                Some(self.gypsum)
            }
            Phase::DiffC3A | Phase::DiffC4A => Some(self.c3ah6),
            Phase::DiffFh3 => Some(self.fh3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub steps: u32,
    pub moves: u64,
    pub reactions: u64,
    pub nucleations: u64,
    pub stale: u64,
    pub extensions: Placement,
    /// Live tracers left after the last step.
    pub remaining: usize,
}

pub struct DiffusionEngine {
    pub nucleation: NucleationTable,
    /// Diffusing C-S-H only attaches in the plane of an oriented plate.
    pub csh_plates: bool,
}

/// Per-step context fixed before any tracer moves.
#[derive(Debug, Clone, Copy)]
struct StepContext {
    sulfate_depleted: bool,
    forced: bool,
}

enum Outcome {
    Stay,
    Moved,
    Reacted,
    Nucleated,
}

impl DiffusionEngine {
    pub fn new(params: &HydrationParams, csh_plates: bool) -> Self {
        Self {
            nucleation: NucleationTable::from_params(params),
            csh_plates,
        }
    }

    /// Run up to `budget` steps or until no tracer is left. With
    /// `is_final_step`, tracers still walking on the last step nucleate.
    pub fn step(&self, state: &mut SimulationState, budget: u32, is_final_step: bool) -> StepReport {
        let mut report = StepReport::default();
        for s in 0..budget {
            if state.tracers.is_empty() {
                break;
            }
            let forced = is_final_step && s + 1 == budget;
            self.sweep(state, forced, &mut report);
            report.steps += 1;
        }
        report.remaining = state.tracers.valid_count();
        debug!(
            cycle = state.cycle,
            steps = report.steps,
            moves = report.moves,
            reactions = report.reactions,
            nucleations = report.nucleations,
            stale = report.stale,
            remaining = report.remaining,
            "diffusion"
        );
        report
    }

    fn sweep(&self, state: &mut SimulationState, forced: bool, report: &mut StepReport) {
        let sulfate_depleted = Phase::SULFATE_SOURCES
            .iter()
            .all(|&p| state.counters.count(p) == 0)
            && state.tracers.count(Phase::DiffGypsum) == 0;
        let ctx = StepContext {
            sulfate_depleted,
            forced,
        };

        let mut i = state.tracers.len();
        while i > 0 {
            i -= 1;
            let id = state.tracers.live_at(i);
            let tracer = *state.tracers.get(id);
            if !state.tracers.is_current(id) || state.lattice.phase[tracer.position] != tracer.kind
            {
                state.tracers.remove_live(i);
                report.stale += 1;
                continue;
            }
            match self.visit(state, i, id, ctx, report) {
                Outcome::Stay => {}
                Outcome::Moved => report.moves += 1,
                Outcome::Reacted => report.reactions += 1,
                Outcome::Nucleated => report.nucleations += 1,
            }
        }
    }

    fn visit(
        &self,
        state: &mut SimulationState,
        i: usize,
        id: u32,
        ctx: StepContext,
        report: &mut StepReport,
    ) -> Outcome {
        let tracer = *state.tracers.get(id);
        let dir = FACE_OFFSETS[state.rng.gen_range(0..FACE_OFFSETS.len())];
        let dest = state.lattice.offset(tracer.position, dir);

        if let Some(dest) = dest {
            let dest_phase = state.lattice.phase[dest];

            if dest_phase.is_saturated_pore() {
                if ctx.forced || self.nucleates(state, tracer.kind) {
                    return self.nucleate(state, i, report);
                }
                let pos = tracer.position;
                state.counters.assign(&mut state.lattice, pos, tracer.pore);
                state.counters.assign(&mut state.lattice, dest, tracer.kind);
                state.lattice.age[dest] = state.lattice.age[pos];
                state.tracers.relocate(id, dest, dest_phase);
                return Outcome::Moved;
            }

            if let Some(rule) = rule_for(tracer.kind, dest_phase) {
                if self.applies(state, rule, dest, dir, ctx) {
                    self.react(state, i, rule, dest, ctx, report);
                    return Outcome::Reacted;
                }
            }
        }

        if ctx.forced {
            return self.nucleate(state, i, report);
        }
        Outcome::Stay
    }

    fn nucleates(&self, state: &mut SimulationState, kind: Phase) -> bool {
        let law = match self.nucleation.law(kind) {
            Some(law) => law,
            None => return false,
        };
        let p = law.probability_at(state.tracers.count(kind)) * state.chemistry.nucleation_scale(kind);
        state.rng.gen::<f64>() < p
    }

    /// Whether `rule` fires for a move along `dir` onto `dest`.
    fn applies(
        &self,
        state: &mut SimulationState,
        rule: &ReactionRule,
        dest: usize,
        dir: Offset,
        ctx: StepContext,
    ) -> bool {
        match rule.condition {
            Condition::Always => {}
            Condition::SulfateDepleted => {
                if !ctx.sulfate_depleted {
                    return false;
                }
            }
            Condition::CshSorption => {
                let held = state.counters.count(Phase::AbsGypsum) as f64;
                if held >= CSH_SORPTION_CAPACITY * state.counters.count(Phase::Csh) as f64 {
                    return false;
                }
            }
        }
        if self.csh_plates && rule.tracer == Phase::DiffCsh && rule.target == Phase::Csh {
            // plate tag 1..=3 is the plate normal; attach only in-plane
            let normal = state.lattice.face[dest];
            if normal != 0 && dir[normal as usize - 1] != 0 {
                return false;
            }
        }
        if rule.target.is_diffusing() {
            match state.tracers.occupant(dest) {
                Some(other) if state.tracers.is_current(other) => {}
                _ => return false,
            }
        }
        rule.probability >= 1.0 || state.rng.gen::<f64>() < rule.probability
    }

    /// Consume tracer `i` according to `rule`.
    fn react(
        &self,
        state: &mut SimulationState,
        i: usize,
        rule: &ReactionRule,
        dest: usize,
        ctx: StepContext,
        report: &mut StepReport,
    ) {
        let tracer = state.tracers.remove_live(i);
        let cycle = state.cycle;
        let pos = tracer.position;

        if let Some((converted, p)) = rule.target_conversion {
            if p >= 1.0 || state.rng.gen::<f64>() < p {
                if rule.target.is_diffusing() {
                    state.tracers.evict(dest);
                }
                state.counters.assign(&mut state.lattice, dest, converted);
                state.lattice.age[dest] = cycle;
            }
        }

        let left = if rule.tracer_becomes.is_saturated_pore() {
            tracer.pore
        } else {
            rule.tracer_becomes
        };
        state.counters.assign(&mut state.lattice, pos, left);
        state.lattice.age[pos] = cycle;
        if rule.tracer_becomes == Phase::Csh && self.csh_plates {
            state.lattice.face[pos] = match state.lattice.face[dest] {
                0 => state.rng.gen_range(1..=3),
                tag => tag,
            };
        }

        self.extend(state, pos, rule.extensions, ctx.forced, report);
    }

    /// Turn tracer `i` into its solid form where it stands.
    fn nucleate(&self, state: &mut SimulationState, i: usize, report: &mut StepReport) -> Outcome {
        let id = state.tracers.live_at(i);
        let kind = state.tracers.get(id).kind;
        let solid = match kind.solid_form() {
            Some(solid) => solid,
            None => return Outcome::Stay,
        };
        let tracer = state.tracers.remove_live(i);
        let pos = tracer.position;
        state.counters.assign(&mut state.lattice, pos, solid);
        state.lattice.age[pos] = state.cycle;
        if solid == Phase::Csh && self.csh_plates {
            state.lattice.face[pos] = state.rng.gen_range(1..=3);
        }
        self.extend(state, pos, nucleation_extension(kind), true, report);
        Outcome::Nucleated
    }

    fn extend(
        &self,
        state: &mut SimulationState,
        origin: usize,
        products: &[(Phase, f64)],
        solidify: bool,
        report: &mut StepReport,
    ) {
        let cycle = state.cycle;
        for &(product, ratio) in products {
            report.extensions += place_products(
                &mut state.lattice,
                &mut state.counters,
                &mut state.tracers,
                &mut state.rng,
                origin,
                product,
                ratio,
                cycle,
                solidify,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Lattice;
    use crate::state::SimRng;
    use crate::tracer::Tracer;
    use rand::SeedableRng;

    fn state_with(phases: &[(usize, usize, usize, Phase)]) -> SimulationState {
        let mut lat = Lattice::new(8, 8, 8, 1.0);
        for &(x, y, z, p) in phases {
            let idx = lat.index(x, y, z);
            lat.phase[idx] = p;
        }
        SimulationState::new(lat, &HydrationParams::default(), 17)
    }

    fn add_tracer(state: &mut SimulationState, x: usize, y: usize, z: usize, kind: Phase) -> usize {
        let idx = state.lattice.index(x, y, z);
        let pore = state.lattice.phase[idx];
        state.counters.assign(&mut state.lattice, idx, kind);
        state.tracers.spawn(Tracer {
            position: idx,
            kind,
            born: 0,
            pore,
        });
        idx
    }

    fn quiet_engine() -> DiffusionEngine {
        let mut params = HydrationParams::default();
        for law in [
            &mut params.nucleation_ch,
            &mut params.nucleation_gypsum,
            &mut params.nucleation_c3ah6,
            &mut params.nucleation_fh3,
        ] {
            law.probability = 0.0;
        }
        DiffusionEngine::new(&params, false)
    }

    #[test]
    fn test_free_walk_conserves_voxels() {
        let mut state = state_with(&[]);
        add_tracer(&mut state, 4, 4, 4, Phase::DiffCh);
        add_tracer(&mut state, 1, 1, 1, Phase::DiffGypsum);
        let report = quiet_engine().step(&mut state, 50, false);
        assert_eq!(report.steps, 50);
        assert_eq!(state.tracers.valid_count(), 2);
        assert_eq!(state.counters.count(Phase::DiffCh), 1);
        assert_eq!(state.counters.count(Phase::DiffGypsum), 1);
        assert_eq!(state.counters.sum(), state.lattice.len() as u64);
        assert!(state.tracers_consistent());
    }

    #[test]
    fn test_forced_final_step_nucleates_everything() {
        let mut state = state_with(&[]);
        add_tracer(&mut state, 4, 4, 4, Phase::DiffCh);
        add_tracer(&mut state, 2, 2, 2, Phase::DiffFh3);
        let report = quiet_engine().step(&mut state, 3, true);
        assert_eq!(report.nucleations, 2);
        assert!(state.tracers.is_empty());
        assert_eq!(state.counters.count(Phase::Ch), 1);
        assert_eq!(state.counters.count(Phase::Fh3), 1);
    }

    #[test]
    fn test_enclosed_tracer_reacts() {
        // DiffCh boxed in by CH on every face must precipitate on first try
        let mut phases = Vec::new();
        for (dx, dy, dz) in [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)] {
            phases.push((
                (4 + dx) as usize,
                (4 + dy) as usize,
                (4 + dz) as usize,
                Phase::Ch,
            ));
        }
        let mut state = state_with(&phases);
        let idx = add_tracer(&mut state, 4, 4, 4, Phase::DiffCh);
        let report = quiet_engine().step(&mut state, 1, false);
        assert_eq!(report.reactions, 1);
        assert_eq!(state.lattice.phase[idx], Phase::Ch);
        assert_eq!(state.counters.count(Phase::Ch), 7);
        assert!(state.tracers.is_empty());
    }

    #[test]
    fn test_tracer_pair_reaction_evicts_partner() {
        // gypsum tracer enclosed by aluminate tracers forms ettringite
        let mut state = state_with(&[]);
        for (x, y, z) in [(5, 4, 4), (3, 4, 4), (4, 5, 4), (4, 3, 4), (4, 4, 5), (4, 4, 3)] {
            add_tracer(&mut state, x, y, z, Phase::DiffC3A);
        }
        let center = add_tracer(&mut state, 4, 4, 4, Phase::DiffGypsum);
        // the gypsum tracer is last in the live list, so it moves first
        quiet_engine().step(&mut state, 1, false);
        assert_eq!(state.lattice.phase[center], Phase::Ettringite);
        assert_eq!(state.tracers.count(Phase::DiffGypsum), 0);
        assert_eq!(state.tracers.count(Phase::DiffC3A), 5);
        assert!(state.counters.count(Phase::Ettringite) >= 2);
        assert_eq!(state.counters.sum(), state.lattice.len() as u64);
        assert!(state.tracers_consistent());
    }

    #[test]
    fn test_stale_tracer_discarded() {
        let mut state = state_with(&[]);
        let idx = add_tracer(&mut state, 4, 4, 4, Phase::DiffCh);
        // overwrite the marker behind the pool's back
        state.counters.assign(&mut state.lattice, idx, Phase::Inert);
        let report = quiet_engine().step(&mut state, 1, false);
        assert_eq!(report.stale, 1);
        assert!(state.tracers.is_empty());
    }

    #[test]
    fn test_sulfate_condition_gates_afm() {
        let mut phases = Vec::new();
        for (dx, dy, dz) in [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)] {
            phases.push((
                (4 + dx) as usize,
                (4 + dy) as usize,
                (4 + dz) as usize,
                Phase::Ettringite,
            ));
        }
        phases.push((0, 0, 0, Phase::Gypsum));
        let mut state = state_with(&phases);
        add_tracer(&mut state, 4, 4, 4, Phase::DiffC3A);
        let report = quiet_engine().step(&mut state, 5, false);
        assert_eq!(report.reactions, 0);

        let g = state.lattice.index(0, 0, 0);
        state.counters.assign(&mut state.lattice, g, Phase::Inert);
        let report = quiet_engine().step(&mut state, 1, false);
        assert_eq!(report.reactions, 1);
        assert!(state.counters.count(Phase::Afm) >= 2);
    }

    fn enclosed_by(target: Phase) -> Vec<(usize, usize, usize, Phase)> {
        [(5, 4, 4), (3, 4, 4), (4, 5, 4), (4, 3, 4), (4, 4, 5), (4, 4, 3)]
            .into_iter()
            .map(|(x, y, z)| (x, y, z, target))
            .collect()
    }

    #[test]
    fn test_diffusing_csh_reacts_with_silica_fume() {
        let mut state = state_with(&enclosed_by(Phase::SilicaFume));
        let idx = add_tracer(&mut state, 4, 4, 4, Phase::DiffCsh);
        let report = quiet_engine().step(&mut state, 200, false);
        assert_eq!(report.reactions, 1);
        assert_ne!(state.lattice.phase[idx], Phase::DiffCsh);
        assert_eq!(state.counters.count(Phase::SilicaFume), 5);
        assert!(state.counters.count(Phase::PozzCsh) >= 2);
        assert!(state.tracers.is_empty());
    }

    #[test]
    fn test_ferrite_ettringite_places_calcium_hydroxide() {
        // CH and FH3 ratios are below one, so look across several seeds
        let mut ch = 0;
        let mut fh3 = 0;
        for seed in 0..40 {
            let mut state = state_with(&enclosed_by(Phase::C4AF));
            state.rng = SimRng::seed_from_u64(seed);
            add_tracer(&mut state, 4, 4, 4, Phase::DiffGypsum);
            let report = quiet_engine().step(&mut state, 1, false);
            assert_eq!(report.reactions, 1);
            assert!(state.counters.count(Phase::EttringiteC4AF) >= 2);
            assert_eq!(state.counters.sum(), state.lattice.len() as u64);
            ch += state.counters.count(Phase::Ch);
            fh3 += state.counters.count(Phase::Fh3);
        }
        assert!(ch > 0);
        assert!(fh3 > 0);
    }

    #[test]
    fn test_gypsum_sorption_stops_at_capacity() {
        let mut phases = enclosed_by(Phase::Csh);
        phases.push((0, 0, 0, Phase::AbsGypsum));
        phases.push((7, 7, 7, Phase::AbsGypsum));
        let mut state = state_with(&phases);
        let idx = add_tracer(&mut state, 4, 4, 4, Phase::DiffGypsum);
        // 2 absorbed already against room for 0.2 per C-S-H voxel
        let report = quiet_engine().step(&mut state, 100, false);
        assert_eq!(report.reactions, 0);

        for corner in [(0, 0, 0), (7, 7, 7)] {
            let c = state.lattice.index(corner.0, corner.1, corner.2);
            state.counters.assign(&mut state.lattice, c, Phase::Inert);
        }
        let report = quiet_engine().step(&mut state, 100, false);
        assert_eq!(report.reactions, 1);
        assert_eq!(state.lattice.phase[idx], Phase::AbsGypsum);
        assert_eq!(state.counters.count(Phase::Csh), 6);
    }

    #[test]
    fn test_walk_through_crack_leaves_crack() {
        // a one-voxel channel of crack porosity, sealed at both ends
        let mut phases = Vec::new();
        for z in 0..8 {
            for y in 0..8 {
                for x in 0..8 {
                    let inside = y == 4 && z == 4 && (2..=5).contains(&x);
                    phases.push((x, y, z, if inside { Phase::Crack } else { Phase::Inert }));
                }
            }
        }
        let mut state = state_with(&phases);
        add_tracer(&mut state, 2, 4, 4, Phase::DiffCh);
        let report = quiet_engine().step(&mut state, 200, false);
        assert!(report.moves > 0);
        assert_eq!(state.counters.count(Phase::Crack), 3);
        assert_eq!(state.counters.count(Phase::Porosity), 0);
        assert_eq!(state.tracers.valid_count(), 1);
        assert!(state.tracers_consistent());
    }
}
