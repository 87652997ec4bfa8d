//! Reaction rule table: what happens when a tracer steps onto a given phase.
//!
//! Each rule names the tracer kind and the phase it runs into. The tracer is
//! always consumed; its own voxel becomes `tracer_becomes`. The destination
//! converts with the given probability, and extension products are placed
//! nearby in proportion to the molar-volume ratio of the reaction.

use crate::phase::Phase;

// --- Empirical volume ratios ---

/// Extra C-S-H per C-S-H deposit (C3S → C-S-H molar volume gain).
pub const CSH_EXTENSION: f64 = 0.521;
/// Extra ettringite per gypsum unit reacting with aluminate.
pub const ETTR_EXTENSION: f64 = 1.90;
/// Aluminate voxels consumed per gypsum unit forming ettringite.
pub const C3A_PER_GYPSUM: f64 = 0.40;
/// Iron hydroxide per ettringite formed from ferrite.
pub const ETTRC4AF_FH3_RATIO: f64 = 0.286;
/// Calcium hydroxide released per ettringite formed from ferrite.
pub const ETTRC4AF_CH_RATIO: f64 = crate::phase::C4AF_CH_RATIO;
/// Extra monosulfate per aluminate unit reacting with ettringite.
pub const AFM_EXTENSION: f64 = 0.278;
/// Extra hydrogarnet per aluminate unit.
pub const C3AH6_EXTENSION: f64 = 0.69;
/// Gypsum volume gained per anhydrite unit.
pub const ANHYDRITE_GYPSUM_EXTENSION: f64 = 0.61;
/// Gypsum volume gained per hemihydrate unit.
pub const HEMIHYDRATE_GYPSUM_EXTENSION: f64 = 0.40;
/// Secondary gypsum gained per sulfate unit attacking CH.
pub const SO4_CH_GYPSUM_EXTENSION: f64 = 1.24;
/// Pozzolanic C-S-H per silica fume voxel.
pub const POZZ_CSH_EXTENSION: f64 = 1.5;
/// Pozzolanic C-S-H per silica fume voxel reached by diffusing C-S-H.
pub const CSH_POZZ_EXTENSION: f64 = 1.0;
/// Slag C-S-H per slag voxel.
pub const SLAG_CSH_EXTENSION: f64 = 1.0;
/// Stratlingite gained per aluminosilicate unit.
pub const STRAT_EXTENSION: f64 = 1.4;
/// Friedel's salt gained per chloride unit.
pub const FRIEDEL_EXTENSION: f64 = 1.3;
/// Carboaluminate gained per carbonate unit.
pub const AFMC_EXTENSION: f64 = 0.5;
/// Absorbed gypsum a C-S-H voxel can hold.
pub const CSH_SORPTION_CAPACITY: f64 = 0.2;

// --- Contact probabilities for slow reactions ---

pub const POZZ_PROBABILITY: f64 = 0.1;
pub const CSH_POZZ_PROBABILITY: f64 = 0.1;
pub const GYPSUM_SORPTION_PROBABILITY: f64 = 0.25;
pub const SLAG_PROBABILITY: f64 = 0.05;
pub const C3AH6_GROWTH_PROBABILITY: f64 = 0.01;
pub const STRAT_PROBABILITY: f64 = 0.05;

/// Extra condition a rule needs on top of its probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// No solid sulfate source and no diffusing gypsum left.
    SulfateDepleted,
    /// Absorbed gypsum below `CSH_SORPTION_CAPACITY` per C-S-H voxel.
    CshSorption,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionRule {
    pub tracer: Phase,
    pub target: Phase,
    pub probability: f64,
    pub condition: Condition,
    /// Phase left on the tracer's voxel.
    pub tracer_becomes: Phase,
    /// Conversion of the destination voxel and its probability.
    pub target_conversion: Option<(Phase, f64)>,
    /// Extension products and their volume ratios.
    pub extensions: &'static [(Phase, f64)],
}

const fn rule(
    tracer: Phase,
    target: Phase,
    probability: f64,
    tracer_becomes: Phase,
    target_conversion: Option<(Phase, f64)>,
    extensions: &'static [(Phase, f64)],
) -> ReactionRule {
    ReactionRule {
        tracer,
        target,
        probability,
        condition: Condition::Always,
        tracer_becomes,
        target_conversion,
        extensions,
    }
}

const fn when_depleted(mut r: ReactionRule) -> ReactionRule {
    r.condition = Condition::SulfateDepleted;
    r
}

const fn within_sorption(mut r: ReactionRule) -> ReactionRule {
    r.condition = Condition::CshSorption;
    r
}

use Phase::*;

const CSH_EXT: &[(Phase, f64)] = &[(Csh, CSH_EXTENSION)];
const ETTR_EXT: &[(Phase, f64)] = &[(Ettringite, ETTR_EXTENSION)];
const ETTRC4AF_EXT: &[(Phase, f64)] = &[
    (EttringiteC4AF, ETTR_EXTENSION),
    (Fh3, ETTRC4AF_FH3_RATIO),
    (Ch, ETTRC4AF_CH_RATIO),
];
const AFM_EXT: &[(Phase, f64)] = &[(Afm, AFM_EXTENSION)];
const C3AH6_EXT: &[(Phase, f64)] = &[(C3AH6, C3AH6_EXTENSION)];
const ANH_EXT: &[(Phase, f64)] = &[(GypsumS, ANHYDRITE_GYPSUM_EXTENSION)];
const HEM_EXT: &[(Phase, f64)] = &[(GypsumS, HEMIHYDRATE_GYPSUM_EXTENSION)];
const SO4_EXT: &[(Phase, f64)] = &[(GypsumS, SO4_CH_GYPSUM_EXTENSION)];
const POZZ_EXT: &[(Phase, f64)] = &[(PozzCsh, POZZ_CSH_EXTENSION)];
const CSH_POZZ_EXT: &[(Phase, f64)] = &[(PozzCsh, CSH_POZZ_EXTENSION)];
const SLAG_EXT: &[(Phase, f64)] = &[(SlagCsh, SLAG_CSH_EXTENSION)];
const STRAT_EXT: &[(Phase, f64)] = &[(Stratlingite, STRAT_EXTENSION)];
const FRIEDEL_EXT: &[(Phase, f64)] = &[(Friedel, FRIEDEL_EXTENSION)];
const FRIEDEL_C4AF_EXT: &[(Phase, f64)] = &[
    (Friedel, FRIEDEL_EXTENSION),
    (Fh3, ETTRC4AF_FH3_RATIO),
];
const AFMC_EXT: &[(Phase, f64)] = &[(Afmc, AFMC_EXTENSION)];
const NONE: &[(Phase, f64)] = &[];

/// Every tracer/target pair that reacts.
pub static RULES: &[ReactionRule] = &[
    // silicates
    rule(DiffCsh, Csh, 1.0, Csh, None, CSH_EXT),
    rule(DiffCsh, C3S, 1.0, Csh, None, CSH_EXT),
    rule(DiffCsh, C2S, 1.0, Csh, None, CSH_EXT),
    rule(DiffCsh, SilicaFume, CSH_POZZ_PROBABILITY, Porosity, Some((PozzCsh, 1.0)), CSH_POZZ_EXT),
    rule(DiffCh, Ch, 1.0, Ch, None, NONE),
    rule(DiffCh, SilicaFume, POZZ_PROBABILITY, Porosity, Some((PozzCsh, 1.0)), POZZ_EXT),
    rule(DiffCh, Slag, SLAG_PROBABILITY, Porosity, Some((SlagCsh, 1.0)), SLAG_EXT),
    // sulfate + aluminate → ettringite
    rule(DiffGypsum, C3A, 1.0, Ettringite, Some((Ettringite, C3A_PER_GYPSUM)), ETTR_EXT),
    rule(DiffGypsum, C4AF, 1.0, EttringiteC4AF, Some((EttringiteC4AF, C3A_PER_GYPSUM)), ETTRC4AF_EXT),
    rule(DiffGypsum, DiffC3A, 1.0, Ettringite, Some((Ettringite, 1.0)), ETTR_EXT),
    rule(DiffGypsum, DiffC4A, 1.0, EttringiteC4AF, Some((EttringiteC4AF, 1.0)), ETTRC4AF_EXT),
    rule(DiffC3A, Gypsum, 1.0, Ettringite, Some((Ettringite, 1.0)), ETTR_EXT),
    rule(DiffC3A, GypsumS, 1.0, Ettringite, Some((Ettringite, 1.0)), ETTR_EXT),
    rule(DiffC4A, Gypsum, 1.0, EttringiteC4AF, Some((EttringiteC4AF, 1.0)), ETTRC4AF_EXT),
    rule(DiffC4A, GypsumS, 1.0, EttringiteC4AF, Some((EttringiteC4AF, 1.0)), ETTRC4AF_EXT),
    rule(DiffAnhydrite, C3A, 1.0, Ettringite, Some((Ettringite, C3A_PER_GYPSUM)), ETTR_EXT),
    rule(DiffAnhydrite, C4AF, 1.0, EttringiteC4AF, Some((EttringiteC4AF, C3A_PER_GYPSUM)), ETTRC4AF_EXT),
    rule(DiffHemihydrate, C3A, 1.0, Ettringite, Some((Ettringite, C3A_PER_GYPSUM)), ETTR_EXT),
    rule(DiffHemihydrate, C4AF, 1.0, EttringiteC4AF, Some((EttringiteC4AF, C3A_PER_GYPSUM)), ETTRC4AF_EXT),
    // gypsum taken up by C-S-H
    within_sorption(rule(DiffGypsum, Csh, GYPSUM_SORPTION_PROBABILITY, AbsGypsum, None, NONE)),
    // aluminate + ettringite → monosulfate once sulfate runs out
    when_depleted(rule(DiffC3A, Ettringite, 1.0, Afm, Some((Afm, 1.0)), AFM_EXT)),
    when_depleted(rule(DiffC4A, Ettringite, 1.0, Afm, Some((Afm, 1.0)), AFM_EXT)),
    when_depleted(rule(DiffEttringite, C3A, 1.0, Afm, Some((Afm, 1.0)), AFM_EXT)),
    when_depleted(rule(DiffEttringite, C4AF, 1.0, Afm, Some((Afm, 1.0)), AFM_EXT)),
    rule(DiffC3A, C3AH6, C3AH6_GROWTH_PROBABILITY, C3AH6, None, C3AH6_EXT),
    rule(DiffC4A, C3AH6, C3AH6_GROWTH_PROBABILITY, C3AH6, None, C3AH6_EXT),
    rule(DiffFh3, Fh3, 1.0, Fh3, None, NONE),
    // calcium sulfates hydrating to gypsum
    rule(DiffAnhydrite, Gypsum, 1.0, GypsumS, None, ANH_EXT),
    rule(DiffAnhydrite, GypsumS, 1.0, GypsumS, None, ANH_EXT),
    rule(DiffHemihydrate, Gypsum, 1.0, GypsumS, None, HEM_EXT),
    rule(DiffHemihydrate, GypsumS, 1.0, GypsumS, None, HEM_EXT),
    rule(DiffSo4, Ch, 1.0, GypsumS, Some((GypsumS, 1.0)), SO4_EXT),
    // aluminosilicates
    rule(DiffAs, Ch, STRAT_PROBABILITY, Stratlingite, Some((Stratlingite, 1.0)), STRAT_EXT),
    rule(DiffCas2, Ch, STRAT_PROBABILITY, Stratlingite, Some((Stratlingite, 1.0)), STRAT_EXT),
    rule(DiffCh, DiffAs, STRAT_PROBABILITY, Stratlingite, Some((Stratlingite, 1.0)), STRAT_EXT),
    rule(DiffCh, DiffCas2, STRAT_PROBABILITY, Stratlingite, Some((Stratlingite, 1.0)), STRAT_EXT),
    rule(DiffAs, DiffCh, STRAT_PROBABILITY, Stratlingite, Some((Stratlingite, 1.0)), STRAT_EXT),
    rule(DiffCas2, DiffCh, STRAT_PROBABILITY, Stratlingite, Some((Stratlingite, 1.0)), STRAT_EXT),
    // chloride and carbonate
    rule(DiffCaCl2, C3A, 1.0, Friedel, Some((Friedel, 1.0)), FRIEDEL_EXT),
    rule(DiffCaCl2, DiffC3A, 1.0, Friedel, Some((Friedel, 1.0)), FRIEDEL_EXT),
    rule(DiffCaCl2, C4AF, 1.0, Friedel, Some((Friedel, 1.0)), FRIEDEL_C4AF_EXT),
    rule(DiffCaCl2, DiffC4A, 1.0, Friedel, Some((Friedel, 1.0)), FRIEDEL_C4AF_EXT),
    rule(DiffCaCO3, Afm, 1.0, Afmc, Some((Afmc, 1.0)), AFMC_EXT),
];

/// Rule for `tracer` stepping onto `target`, if the pair reacts.
pub fn rule_for(tracer: Phase, target: Phase) -> Option<&'static ReactionRule> {
    RULES
        .iter()
        .find(|r| r.tracer == tracer && r.target == target)
}

/// Extension placed when a tracer nucleates in place.
pub fn nucleation_extension(kind: Phase) -> &'static [(Phase, f64)] {
    match kind {
        DiffCsh => CSH_EXT,
        DiffC3A | DiffC4A => C3AH6_EXT,
        DiffAnhydrite => ANH_EXT,
        DiffHemihydrate => HEM_EXT,
        _ => NONE,
    }
}
