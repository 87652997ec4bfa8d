//! Per-phase dissolution probabilities and their once-per-cycle feedback.

use tracing::debug;

use crate::chemistry::ChemistryState;
use crate::config::HydrationParams;
use crate::counters::PhaseCounters;
use crate::phase::{spec, Creates, Phase};

/// Reaction-probability state. Indexed by phase id.
#[derive(Debug, Clone)]
pub struct ReactionState {
    /// Current dissolution probability before pH scaling.
    pub probability: [f64; Phase::COUNT],
    /// Base probability from the parameter file.
    pub base: [f64; Phase::COUNT],
    pub soluble: [bool; Phase::COUNT],
    pub creates: [Creates; Phase::COUNT],
    pub ph_factor: [f64; Phase::COUNT],
    one_voxel_bias: f64,
}

impl ReactionState {
    pub fn new(params: &HydrationParams) -> Self {
        let mut base = [0.0; Phase::COUNT];
        let mut soluble = [false; Phase::COUNT];
        let mut creates = [Creates::Nothing; Phase::COUNT];
        for p in Phase::ALL {
            let s = spec(p);
            let i = p.index();
            base[i] = params
                .dissolution
                .get(i)
                .copied()
                .unwrap_or(s.dissolution_coefficient);
            soluble[i] = s.soluble;
            creates[i] = s.creates;
        }
        let probability = base.map(|b| b * params.dissolution_bias);
        Self {
            probability,
            base,
            soluble,
            creates,
            ph_factor: [1.0; Phase::COUNT],
            one_voxel_bias: params.one_voxel_bias,
        }
    }

    #[inline]
    pub fn is_soluble(&self, phase: Phase) -> bool {
        self.soluble[phase.index()]
    }

    /// Chance that an eligible voxel of `phase` dissolves this cycle.
    /// `floating` marks a single voxel with no solid face neighbor.
    #[inline]
    pub fn dissolution_probability(&self, phase: Phase, floating: bool) -> f64 {
        let i = phase.index();
        let mut p = self.ph_factor[i] * self.probability[i];
        if floating {
            p *= self.one_voxel_bias;
        }
        p.clamp(0.0, 1.0)
    }

    /// Override one probability, bypassing feedback until the next update.
    pub fn set_probability(&mut self, phase: Phase, probability: f64) {
        self.probability[phase.index()] = probability;
    }

    /// Feed counters and chemistry back into the probabilities.
    pub fn update(
        &mut self,
        counters: &PhaseCounters,
        chemistry: &ChemistryState,
        params: &HydrationParams,
        ph_feedback: bool,
    ) {
        let bias = params.dissolution_bias;
        for p in Phase::ALL {
            let i = p.index();
            self.probability[i] = self.base[i] * bias;
        }

        // solid sulfate retards the aluminates
        let sulfate_left = Phase::SULFATE_SOURCES
            .iter()
            .any(|&p| counters.count(p) > 0);
        if sulfate_left {
            for p in [Phase::C3A, Phase::C4AF] {
                self.probability[p.index()] *= params.c3a_sulfate_factor;
            }
        }

        // once sulfate is gone, ettringite turns unstable and feeds AFm
        let ettringite_soluble = !sulfate_left && counters.count(Phase::DiffGypsum) == 0;
        for p in [Phase::Ettringite, Phase::EttringiteC4AF] {
            self.soluble[p.index()] = ettringite_soluble || spec(p).soluble;
        }

        // silicates become diffusion limited past the C-S-H scale
        let csh = counters.count(Phase::Csh) as f64;
        let limited = params.csh_scale > 0.0 && csh > params.csh_scale;
        if limited {
            let scale = params.csh_scale / csh;
            for p in [Phase::C3S, Phase::C2S] {
                self.probability[p.index()] *= scale * scale;
            }
        }

        for p in Phase::ALL {
            let i = p.index();
            self.ph_factor[i] = if ph_feedback {
                params.ph_fits.get(i).map_or(1.0, |fit| fit.factor(chemistry.ph))
            } else {
                1.0
            };
        }

        debug!(
            sulfate_left,
            ettringite_soluble,
            diffusion_limited = limited,
            ph = chemistry.ph,
            "reaction probabilities updated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Lattice;

    fn counters_with(phases: &[(Phase, usize)]) -> PhaseCounters {
        let mut lat = Lattice::new(4, 4, 4, 1.0);
        let mut idx = 0;
        for &(p, n) in phases {
            for _ in 0..n {
                lat.phase[idx] = p;
                idx += 1;
            }
        }
        PhaseCounters::from_lattice(&lat)
    }

    #[test]
    fn test_initial_probabilities_follow_table() {
        let params = HydrationParams::default();
        let state = ReactionState::new(&params);
        assert!((state.dissolution_probability(Phase::C3S, false) - 0.7).abs() < 1e-12);
        assert_eq!(state.dissolution_probability(Phase::Inert, false), 0.0);
        assert!(state.is_soluble(Phase::Gypsum));
        assert!(!state.is_soluble(Phase::Ettringite));
    }

    #[test]
    fn test_sulfate_slows_aluminates() {
        let params = HydrationParams::default();
        let mut state = ReactionState::new(&params);
        let chem = ChemistryState::default();

        state.update(&counters_with(&[(Phase::Gypsum, 3)]), &chem, &params, false);
        let with_sulfate = state.dissolution_probability(Phase::C3A, false);
        assert!(!state.is_soluble(Phase::Ettringite));

        state.update(&counters_with(&[(Phase::C3A, 3)]), &chem, &params, false);
        let without = state.dissolution_probability(Phase::C3A, false);
        assert!((with_sulfate - without * params.c3a_sulfate_factor).abs() < 1e-12);
        assert!(state.is_soluble(Phase::Ettringite));
    }

    #[test]
    fn test_csh_scale_limits_silicates() {
        let mut params = HydrationParams::default();
        params.csh_scale = 8.0;
        let mut state = ReactionState::new(&params);
        let chem = ChemistryState::default();
        state.update(&counters_with(&[(Phase::Csh, 16)]), &chem, &params, false);
        let p = state.dissolution_probability(Phase::C3S, false);
        assert!((p - 0.7 * 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_ph_feedback_and_floating_bias() {
        let mut params = HydrationParams::default();
        params.one_voxel_bias = 3.0;
        params.ph_fits[Phase::C3S.index()].c1 = 1.0;
        let mut state = ReactionState::new(&params);
        let chem = ChemistryState {
            ph: 12.9,
            ..ChemistryState::default()
        };
        state.update(&counters_with(&[]), &chem, &params, true);
        assert!((state.ph_factor[Phase::C3S.index()] - 1.4).abs() < 1e-9);
        assert_eq!(state.dissolution_probability(Phase::C3S, true), 1.0);
    }
}
