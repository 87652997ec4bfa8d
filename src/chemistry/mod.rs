//! Pore-solution chemistry.
//!
//! Derives the ionic composition of the pore solution from the phase
//! counters once per cycle:
//!
//! 1. Alkali release per gram of starting solids: a readily soluble fraction
//!    that dissolves over the first hours, the rest in proportion to the
//!    degree of hydration, plus whatever alkali sulfate has dissolved.
//! 2. Dilution into the capillary water, with part of the alkali bound by C-S-H.
//! 3. Ca²⁺, OH⁻ and SO₄²⁻ from electroneutrality with CH saturation and, when
//!    a solid controls sulfate, the matching solubility product. That case
//!    reduces to a quartic in √[Ca²⁺], solved with [`roots::polynomial_roots`].
//! 4. Activity coefficients iterated against ionic strength.
//! 5. Syngenite precipitated or redissolved step by step until its
//!    saturation state stops changing.
//!
//! The resulting pH scales dissolution rates, and the gypsum/CH saturation
//! indices scale nucleation of the matching diffusing species.

pub mod activity;
pub mod roots;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::counters::PhaseCounters;
use crate::phase::{properties, Phase};

use activity::{ionic_strength, Activities, CA, K, NA, OH, SO4};

/// Relative ionic-strength change that ends the activity iteration.
pub const ACTIVITY_TOLERANCE: f64 = 0.10;
pub const MAX_ACTIVITY_ITERATIONS: usize = 10_000;
const MAX_SYNGENITE_STEPS: usize = 1000;
/// Fraction of the available potassium moved per syngenite step.
const SYNGENITE_STEP: f64 = 0.01;

const NA2O_MOLAR_MASS: f64 = 61.98;
const K2O_MOLAR_MASS: f64 = 94.2;

/// Composition of the mix and solubility data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChemistryConfig {
    /// Total Na₂O, mass % of cement.
    pub na2o_percent: f64,
    /// Total K₂O, mass % of cement.
    pub k2o_percent: f64,
    /// Fraction of Na released early (readily soluble).
    pub readily_soluble_na: f64,
    /// Fraction of K released early.
    pub readily_soluble_k: f64,
    /// Time over which the readily soluble alkali dissolves [h].
    pub early_release_hours: f64,
    /// Na binding by C-S-H [mL/g C-S-H].
    pub binding_na: f64,
    /// K binding by C-S-H [mL/g C-S-H].
    pub binding_k: f64,
    pub log_ksp_ch: f64,
    pub log_ksp_gypsum: f64,
    /// Effective sulfate solubility product when ettringite controls sulfate.
    pub log_ksp_ettringite: f64,
    pub log_ksp_syngenite: f64,
}

impl Default for ChemistryConfig {
    fn default() -> Self {
        Self {
            na2o_percent: 0.2,
            k2o_percent: 0.6,
            readily_soluble_na: 0.3,
            readily_soluble_k: 0.6,
            early_release_hours: 1.0,
            binding_na: 0.31,
            binding_k: 0.20,
            log_ksp_ch: -5.2,
            log_ksp_gypsum: -4.58,
            log_ksp_ettringite: -7.0,
            log_ksp_syngenite: -7.2,
        }
    }
}

/// Which equilibrium fixes the sulfate concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SulfateControl {
    Gypsum,
    Ettringite,
    /// No sulfate solid; sulfate is whatever alkali sulfate released.
    Alkali,
}

/// Pore-solution state after one update. Concentrations in mol/L.
#[derive(Debug, Clone, PartialEq)]
pub struct ChemistryState {
    pub ca: f64,
    pub oh: f64,
    pub so4: f64,
    pub na: f64,
    pub k: f64,
    pub activities: Activities,
    pub ionic_strength: f64,
    pub ph: f64,
    /// Conductivity [S/m].
    pub conductivity: f64,
    /// Precipitated syngenite [mol per g of starting solids].
    pub syngenite: f64,
    pub control: SulfateControl,
    /// Ion activity product over Ksp for CH.
    pub ch_saturation: f64,
    /// Ion activity product over Ksp for gypsum.
    pub gypsum_saturation: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl Default for ChemistryState {
    fn default() -> Self {
        Self {
            ca: 0.0,
            oh: 0.0,
            so4: 0.0,
            na: 0.0,
            k: 0.0,
            activities: Activities::unity(),
            ionic_strength: 0.0,
            ph: crate::config::PH_REFERENCE,
            conductivity: 0.0,
            syngenite: 0.0,
            control: SulfateControl::Alkali,
            ch_saturation: 1.0,
            gypsum_saturation: 1.0,
            iterations: 0,
            converged: true,
        }
    }
}

impl ChemistryState {
    /// Nucleation multiplier for a diffusing species.
    pub fn nucleation_scale(&self, kind: Phase) -> f64 {
        match kind {
            Phase::DiffCh => self.ch_saturation.clamp(0.0, 1.0),
            Phase::DiffGypsum | Phase::DiffSo4 => self.gypsum_saturation.clamp(0.0, 1.0),
            _ => 1.0,
        }
    }
}

/// Ca/OH/SO4 from one speciation solve.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Speciation {
    ca: f64,
    oh: f64,
    so4: f64,
}

/// Solution-side inputs derived from the counters.
#[derive(Debug, Clone, Copy)]
struct Inventory {
    /// Capillary solution [L per g of starting solids].
    volume: f64,
    volume_na: f64,
    volume_k: f64,
    released_na: f64,
    released_k: f64,
    /// Sulfate from dissolved alkali sulfates [mol/g].
    alkali_sulfate: f64,
    control: SulfateControl,
}

pub struct ChemistrySolver {
    pub config: ChemistryConfig,
}

impl ChemistrySolver {
    pub fn new(config: ChemistryConfig) -> Self {
        Self { config }
    }

    fn ksp(log: f64) -> f64 {
        10f64.powf(log)
    }

    fn inventory(&self, counters: &PhaseCounters, time_h: f64) -> Option<Inventory> {
        let mass = counters.cement_mass();
        if mass <= 0.0 {
            return None;
        }
        let c = &self.config;
        let alpha = counters.degree_of_hydration();

        let solution_voxels: u64 = Phase::ALL
            .iter()
            .filter(|p| p.is_saturated_pore() || p.is_diffusing())
            .map(|&p| counters.count(p))
            .sum();
        let volume = (solution_voxels as f64 / (1000.0 * mass)).max(1.0e-9);

        let csh_mass: f64 = [Phase::Csh, Phase::PozzCsh, Phase::SlagCsh]
            .iter()
            .map(|&p| counters.count(p) as f64 * properties(p).specific_gravity)
            .sum::<f64>()
            / mass;

        let dissolved_moles = |p: Phase| {
            counters.reacted(p) as f64 * properties(p).specific_gravity
                / properties(p).molar_mass()
                / mass
        };
        let k2so4 = dissolved_moles(Phase::K2SO4);
        let na2so4 = dissolved_moles(Phase::Na2SO4);

        let early = if c.early_release_hours > 0.0 {
            (time_h / c.early_release_hours).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let na_total = 2.0 * c.na2o_percent / 100.0 / NA2O_MOLAR_MASS;
        let k_total = 2.0 * c.k2o_percent / 100.0 / K2O_MOLAR_MASS;
        let released_na = na_total
            * (c.readily_soluble_na * early + (1.0 - c.readily_soluble_na) * alpha)
            + 2.0 * na2so4;
        let released_k = k_total
            * (c.readily_soluble_k * early + (1.0 - c.readily_soluble_k) * alpha)
            + 2.0 * k2so4;

        let sulfate_solid = Phase::SULFATE_SOURCES
            .iter()
            .any(|&p| counters.count(p) > 0);
        let ettringite =
            counters.count(Phase::Ettringite) + counters.count(Phase::EttringiteC4AF) > 0;
        let control = if sulfate_solid {
            SulfateControl::Gypsum
        } else if ettringite {
            SulfateControl::Ettringite
        } else {
            SulfateControl::Alkali
        };

        Some(Inventory {
            volume,
            volume_na: volume + c.binding_na / 1000.0 * csh_mass,
            volume_k: volume + c.binding_k / 1000.0 * csh_mass,
            released_na,
            released_k,
            alkali_sulfate: k2so4 + na2so4,
            control,
        })
    }

    /// Ca, OH and SO4 for fixed alkali, free sulfate and activity coefficients.
    fn speciate(
        &self,
        na: f64,
        k: f64,
        free_so4: f64,
        gamma: &Activities,
        control: SulfateControl,
    ) -> Speciation {
        let ksp_ch = Self::ksp(self.config.log_ksp_ch);
        let ksp_so4 = match control {
            SulfateControl::Gypsum => Some(Self::ksp(self.config.log_ksp_gypsum)),
            SulfateControl::Ettringite => Some(Self::ksp(self.config.log_ksp_ettringite)),
            SulfateControl::Alkali => None,
        };

        if let Some(ksp_so4) = ksp_so4 {
            // s = √[Ca]:  2s⁴ + (Na+K)s² − A s − 2B = 0
            let a = (ksp_ch / (gamma.ca * gamma.oh * gamma.oh)).sqrt();
            let b = ksp_so4 / (gamma.ca * gamma.so4);
            let coeffs = [-2.0 * b, -a, na + k, 0.0, 2.0];
            let found = roots::polynomial_roots(&coeffs, true);
            let residual = |s: f64| na + k + 2.0 * s * s - a / s - 2.0 * b / (s * s);
            match roots::select_positive_real(&found, residual) {
                Some(s) => {
                    let ca = s * s;
                    return Speciation {
                        ca,
                        oh: a / s,
                        so4: b / ca,
                    };
                }
                None => {
                    error!(na, k, "no positive real root for calcium; using OH balance");
                }
            }
        }
        self.balance_hydroxide(na, k, free_so4, gamma, ksp_ch)
    }

    /// Direct OH⁻ balance with CH saturation, by bisection on
    /// `Na + K − 2SO4 + 2Ca(OH) − OH = 0`, which falls monotonically in OH.
    fn balance_hydroxide(
        &self,
        na: f64,
        k: f64,
        so4: f64,
        gamma: &Activities,
        ksp_ch: f64,
    ) -> Speciation {
        let ca_of = |oh: f64| ksp_ch / (gamma.ca * gamma.oh * gamma.oh * oh * oh);
        let f = |oh: f64| na + k - 2.0 * so4 + 2.0 * ca_of(oh) - oh;

        let mut lo = 1.0e-12;
        let mut hi = (na + k).max(1.0e-3) * 2.0;
        let mut doublings = 0;
        while f(hi) > 0.0 && doublings < 200 {
            hi *= 2.0;
            doublings += 1;
        }
        for _ in 0..200 {
            let mid = 0.5 * (lo + hi);
            if f(mid) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
            if (hi - lo) <= 1.0e-14 * hi {
                break;
            }
        }
        let oh = 0.5 * (lo + hi);
        Speciation {
            ca: ca_of(oh),
            oh,
            so4,
        }
    }

    /// Ion activity product of syngenite, K₂Ca(SO₄)₂·H₂O.
    fn syngenite_iap(k: f64, s: &Speciation, gamma: &Activities) -> f64 {
        let ak = gamma.k * k;
        let aso4 = gamma.so4 * s.so4;
        ak * ak * gamma.ca * s.ca * aso4 * aso4
    }

    /// Recompute the pore solution.
    pub fn update(
        &self,
        counters: &PhaseCounters,
        time_h: f64,
        previous: &ChemistryState,
    ) -> ChemistryState {
        let inv = match self.inventory(counters, time_h) {
            Some(inv) => inv,
            None => return previous.clone(),
        };

        let mut syngenite = previous.syngenite.clamp(0.0, inv.released_k / 2.0);
        let na = inv.released_na / inv.volume_na;
        let solution = |syngenite: f64| {
            let k = (inv.released_k - 2.0 * syngenite).max(0.0) / inv.volume_k;
            let free_so4 = match inv.control {
                SulfateControl::Alkali => {
                    (inv.alkali_sulfate - 2.0 * syngenite).max(0.0) / inv.volume
                }
                _ => 0.0,
            };
            (k, free_so4)
        };

        // activity / ionic strength fixed point
        let (k, free_so4) = solution(syngenite);
        let mut gamma = Activities::unity();
        let mut spec = self.speciate(na, k, free_so4, &gamma, inv.control);
        let mut ionic = ionic_strength(spec.ca, spec.oh, spec.so4, na, k);
        let mut iterations = 0;
        let mut converged = false;
        while iterations < MAX_ACTIVITY_ITERATIONS {
            iterations += 1;
            gamma = Activities::at(ionic);
            spec = self.speciate(na, k, free_so4, &gamma, inv.control);
            let next = ionic_strength(spec.ca, spec.oh, spec.so4, na, k);
            let change = (next - ionic).abs() / ionic.max(1.0e-12);
            ionic = next;
            if change < ACTIVITY_TOLERANCE {
                converged = true;
                break;
            }
        }
        if !converged {
            error!(
                iterations,
                ionic_strength = ionic,
                "ionic strength iteration did not converge; keeping last estimate"
            );
        }

        // syngenite: step until the saturation state flips
        let ksp_syn = Self::ksp(self.config.log_ksp_syngenite);
        let (mut k, mut free_so4) = (k, free_so4);
        let start_super = Self::syngenite_iap(k, &spec, &gamma) > ksp_syn;
        let precipitating = start_super;
        if start_super || syngenite > 0.0 {
            let step_base = (inv.released_k / 2.0).max(syngenite) * SYNGENITE_STEP;
            for _ in 0..MAX_SYNGENITE_STEPS {
                let supersaturated = Self::syngenite_iap(k, &spec, &gamma) > ksp_syn;
                if precipitating {
                    let available = (inv.released_k / 2.0 - syngenite).max(0.0);
                    if !supersaturated || available <= 0.0 {
                        break;
                    }
                    syngenite += step_base.min(available);
                } else {
                    if supersaturated || syngenite <= 0.0 {
                        break;
                    }
                    syngenite = (syngenite - step_base).max(0.0);
                }
                let (k_next, so4_next) = solution(syngenite);
                k = k_next;
                free_so4 = so4_next;
                spec = self.speciate(na, k, free_so4, &gamma, inv.control);
            }
        }

        let ionic = ionic_strength(spec.ca, spec.oh, spec.so4, na, k);
        let ph = if spec.oh > 0.0 {
            14.0 + (gamma.oh * spec.oh).log10()
        } else {
            7.0
        };
        let conductivity = CA.conductivity(spec.ca, ionic)
            + OH.conductivity(spec.oh, ionic)
            + SO4.conductivity(spec.so4, ionic)
            + NA.conductivity(na, ionic)
            + K.conductivity(k, ionic);

        let a_ca = gamma.ca * spec.ca;
        let a_oh = gamma.oh * spec.oh;
        let ch_saturation = a_ca * a_oh * a_oh / Self::ksp(self.config.log_ksp_ch);
        let gypsum_saturation =
            a_ca * gamma.so4 * spec.so4 / Self::ksp(self.config.log_ksp_gypsum);

        debug!(
            ph,
            ca = spec.ca,
            oh = spec.oh,
            so4 = spec.so4,
            na,
            k,
            syngenite,
            iterations,
            "pore solution updated"
        );

        ChemistryState {
            ca: spec.ca,
            oh: spec.oh,
            so4: spec.so4,
            na,
            k,
            activities: gamma,
            ionic_strength: ionic,
            ph,
            conductivity,
            syngenite,
            control: inv.control,
            ch_saturation,
            gypsum_saturation,
            iterations,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Lattice;

    fn paste(fill: &[(Phase, usize)]) -> PhaseCounters {
        let mut lat = Lattice::new(10, 10, 10, 1.0);
        let mut idx = 0;
        for &(phase, n) in fill {
            for _ in 0..n {
                lat.phase[idx] = phase;
                idx += 1;
            }
        }
        let mut counters = PhaseCounters::from_lattice(&lat);
        counters.establish_original(&lat);
        counters
    }

    fn alkali_free() -> ChemistryConfig {
        ChemistryConfig {
            na2o_percent: 0.0,
            k2o_percent: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_alkali_free_solution_is_ch_saturated() {
        let counters = paste(&[(Phase::C3S, 500)]);
        let solver = ChemistrySolver::new(alkali_free());
        let state = solver.update(&counters, 1.0, &ChemistryState::default());
        assert_eq!(state.control, SulfateControl::Alkali);
        assert!(state.ph > 12.0 && state.ph < 12.7, "pH {}", state.ph);
        // charge balance: 2Ca = OH
        assert!((2.0 * state.ca - state.oh).abs() < 1e-9);
        assert!((state.ch_saturation - 1.0).abs() < 1e-6);
        assert!(state.converged);
    }

    #[test]
    fn test_alkali_raises_ph() {
        let counters = paste(&[(Phase::C3S, 500)]);
        let plain = ChemistrySolver::new(alkali_free()).update(
            &counters,
            10.0,
            &ChemistryState::default(),
        );
        let alkali = ChemistrySolver::new(ChemistryConfig::default()).update(
            &counters,
            10.0,
            &ChemistryState::default(),
        );
        assert!(alkali.k > 0.0 && alkali.na > 0.0);
        assert!(alkali.ph > plain.ph);
        assert!(alkali.conductivity > plain.conductivity);
    }

    #[test]
    fn test_gypsum_controls_sulfate_through_quartic() {
        let counters = paste(&[(Phase::C3S, 400), (Phase::Gypsum, 50), (Phase::Csh, 50)]);
        let solver = ChemistrySolver::new(ChemistryConfig::default());
        let s = solver.update(&counters, 10.0, &ChemistryState::default());
        assert_eq!(s.control, SulfateControl::Gypsum);
        let positive = s.na + s.k + 2.0 * s.ca;
        let negative = s.oh + 2.0 * s.so4;
        assert!((positive - negative).abs() < 1e-6 * positive, "{positive} vs {negative}");
        assert!(s.so4 > 0.0 && s.ca > 0.0);
        assert!((s.gypsum_saturation - 1.0).abs() < 1e-6);
        assert!(s.ph > 12.5);
    }

    #[test]
    fn test_syngenite_redissolves_without_potassium() {
        let counters = paste(&[(Phase::C3S, 500)]);
        let solver = ChemistrySolver::new(alkali_free());
        let previous = ChemistryState {
            syngenite: 1.0e-4,
            ..Default::default()
        };
        let state = solver.update(&counters, 1.0, &previous);
        assert!(state.syngenite < previous.syngenite);
        assert!(state.syngenite >= 0.0);
    }

    #[test]
    fn test_empty_paste_keeps_previous_state() {
        let counters = paste(&[]);
        let solver = ChemistrySolver::new(ChemistryConfig::default());
        let previous = ChemistryState::default();
        assert_eq!(solver.update(&counters, 1.0, &previous), previous);
    }

    #[test]
    fn test_nucleation_scale() {
        let state = ChemistryState {
            gypsum_saturation: 0.25,
            ch_saturation: 3.0,
            ..Default::default()
        };
        assert_eq!(state.nucleation_scale(Phase::DiffGypsum), 0.25);
        assert_eq!(state.nucleation_scale(Phase::DiffCh), 1.0);
        assert_eq!(state.nucleation_scale(Phase::DiffC3A), 1.0);
    }
}
