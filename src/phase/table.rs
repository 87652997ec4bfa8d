//! Phase capability descriptors.
//!
//! One row per phase id. The dissolution pass, the reaction feedback and the
//! percolation analyzer all read these rows instead of switching on phase ids.

use super::{Phase, PhaseClass};

// ---------------------------------------------------------------------------
// Dissolution byproduct ratios (tracers per dissolved voxel)
// ---------------------------------------------------------------------------

/// CH per dissolved C3S voxel: 1.3 mol CH (43.0 cm³) per 71.0 cm³ of C3S.
pub const C3S_CH_RATIO: f64 = 0.61;
/// Extra diffusing C-S-H per dissolved C2S voxel, on top of the primary tracer.
pub const C2S_CSH_RATIO: f64 = 0.3655;
/// CH per dissolved C2S voxel.
pub const C2S_CH_RATIO: f64 = 0.191;
/// Probability a dissolved C4AF voxel yields an aluminate tracer instead of
/// an iron hydroxide tracer. Empirical; kept as calibrated.
pub const C4AF_ALUMINATE_FRACTION: f64 = 0.6053;
/// CH per dissolved C4AF voxel. Empirical; kept as calibrated.
pub const C4AF_CH_RATIO: f64 = 0.3295;
/// Sulfate tracers (gypsum-voxel equivalents) per dissolved K2SO4 voxel.
pub const K2SO4_SO4_RATIO: f64 = 0.8827;
/// Sulfate tracers (gypsum-voxel equivalents) per dissolved Na2SO4 voxel.
pub const NA2SO4_SO4_RATIO: f64 = 0.7143;

/// What a dissolving voxel turns into besides porosity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Creates {
    /// Not dissolvable.
    Nothing,
    /// Converts straight to porosity, no primary tracer.
    Porosity,
    /// One tracer of the given diffusing kind.
    Tracer(Phase),
    /// `primary` with probability `primary_fraction`, else `secondary`.
    Split {
        primary: Phase,
        secondary: Phase,
        primary_fraction: f64,
    },
}

/// Role of a phase in the set-point (solid skeleton) burn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetClass {
    Neither,
    /// Unreacted cementitious grains.
    Binder,
    /// Hydration products that glue binder grains together.
    Bridging,
}

/// Capability descriptor for one phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseSpec {
    pub phase: Phase,
    /// Table name, also used in parameter files and reports.
    pub name: &'static str,
    pub class: PhaseClass,
    pub set_class: SetClass,
    /// Soluble at the start of a run.
    pub soluble: bool,
    pub creates: Creates,
    /// Extra tracers seeded at random pore sites per dissolved voxel.
    pub byproducts: &'static [(Phase, f64)],
    /// Default dissolution probability per eligible voxel per cycle.
    pub dissolution_coefficient: f64,
    /// Stable solid for diffusing species.
    pub solid_form: Option<Phase>,
}

const NO_BYPRODUCTS: &[(Phase, f64)] = &[];

const fn pore(phase: Phase, name: &'static str) -> PhaseSpec {
    PhaseSpec {
        phase,
        name,
        class: PhaseClass::Pore,
        set_class: SetClass::Neither,
        soluble: false,
        creates: Creates::Nothing,
        byproducts: NO_BYPRODUCTS,
        dissolution_coefficient: 0.0,
        solid_form: None,
    }
}

const fn reactant(
    phase: Phase,
    name: &'static str,
    set_class: SetClass,
    soluble: bool,
    creates: Creates,
    byproducts: &'static [(Phase, f64)],
    dissolution_coefficient: f64,
) -> PhaseSpec {
    PhaseSpec {
        phase,
        name,
        class: PhaseClass::Reactant,
        set_class,
        soluble,
        creates,
        byproducts,
        dissolution_coefficient,
        solid_form: None,
    }
}

const fn inert(phase: Phase, name: &'static str) -> PhaseSpec {
    PhaseSpec {
        phase,
        name,
        class: PhaseClass::Inert,
        set_class: SetClass::Neither,
        soluble: false,
        creates: Creates::Nothing,
        byproducts: NO_BYPRODUCTS,
        dissolution_coefficient: 0.0,
        solid_form: None,
    }
}

const fn product(
    phase: Phase,
    name: &'static str,
    set_class: SetClass,
    soluble: bool,
    creates: Creates,
    dissolution_coefficient: f64,
) -> PhaseSpec {
    PhaseSpec {
        phase,
        name,
        class: PhaseClass::Product,
        set_class,
        soluble,
        creates,
        byproducts: NO_BYPRODUCTS,
        dissolution_coefficient,
        solid_form: None,
    }
}

const fn diffusing(phase: Phase, name: &'static str, solid: Phase) -> PhaseSpec {
    PhaseSpec {
        phase,
        name,
        class: PhaseClass::Diffusing,
        set_class: SetClass::Neither,
        soluble: false,
        creates: Creates::Nothing,
        byproducts: NO_BYPRODUCTS,
        dissolution_coefficient: 0.0,
        solid_form: Some(solid),
    }
}

use Creates::{Nothing, Porosity, Tracer};
use SetClass::{Binder, Bridging, Neither};

static PHASE_TABLE: [PhaseSpec; Phase::COUNT] = [
    pore(Phase::Porosity, "POROSITY"),
    reactant(
        Phase::C3S,
        "C3S",
        Binder,
        true,
        Tracer(Phase::DiffCsh),
        &[(Phase::DiffCh, C3S_CH_RATIO)],
        0.7,
    ),
    reactant(
        Phase::C2S,
        "C2S",
        Binder,
        true,
        Tracer(Phase::DiffCsh),
        &[(Phase::DiffCsh, C2S_CSH_RATIO), (Phase::DiffCh, C2S_CH_RATIO)],
        0.1,
    ),
    reactant(
        Phase::C3A,
        "C3A",
        Binder,
        true,
        Tracer(Phase::DiffC3A),
        NO_BYPRODUCTS,
        0.4,
    ),
    reactant(
        Phase::C4AF,
        "C4AF",
        Binder,
        true,
        Creates::Split {
            primary: Phase::DiffC4A,
            secondary: Phase::DiffFh3,
            primary_fraction: C4AF_ALUMINATE_FRACTION,
        },
        &[(Phase::DiffCh, C4AF_CH_RATIO)],
        0.2,
    ),
    reactant(
        Phase::K2SO4,
        "K2SO4",
        Neither,
        true,
        Porosity,
        &[(Phase::DiffSo4, K2SO4_SO4_RATIO)],
        1.0,
    ),
    reactant(
        Phase::Na2SO4,
        "NA2SO4",
        Neither,
        true,
        Porosity,
        &[(Phase::DiffSo4, NA2SO4_SO4_RATIO)],
        1.0,
    ),
    reactant(
        Phase::Gypsum,
        "GYPSUM",
        Neither,
        true,
        Tracer(Phase::DiffGypsum),
        NO_BYPRODUCTS,
        0.05,
    ),
    reactant(
        Phase::Hemihydrate,
        "HEMIHYD",
        Neither,
        true,
        Tracer(Phase::DiffHemihydrate),
        NO_BYPRODUCTS,
        0.3,
    ),
    reactant(
        Phase::Anhydrite,
        "ANHYDRITE",
        Neither,
        true,
        Tracer(Phase::DiffAnhydrite),
        NO_BYPRODUCTS,
        0.03,
    ),
    // silica fume and slag only react on contact with diffusing CH
    reactant(Phase::SilicaFume, "SFUME", Neither, false, Nothing, NO_BYPRODUCTS, 0.0),
    inert(Phase::Inert, "INERT"),
    reactant(Phase::Slag, "SLAG", Binder, false, Nothing, NO_BYPRODUCTS, 0.0),
    reactant(
        Phase::Asg,
        "ASG",
        Binder,
        true,
        Tracer(Phase::DiffAs),
        NO_BYPRODUCTS,
        0.001,
    ),
    reactant(
        Phase::Cas2,
        "CAS2",
        Binder,
        true,
        Tracer(Phase::DiffCas2),
        NO_BYPRODUCTS,
        0.001,
    ),
    product(Phase::Ch, "CH", Neither, false, Tracer(Phase::DiffCh), 0.0),
    product(Phase::Csh, "CSH", Bridging, false, Nothing, 0.0),
    product(Phase::C3AH6, "C3AH6", Bridging, false, Nothing, 0.0),
    product(
        Phase::Ettringite,
        "ETTR",
        Bridging,
        false,
        Tracer(Phase::DiffEttringite),
        0.008,
    ),
    product(
        Phase::EttringiteC4AF,
        "ETTRC4AF",
        Bridging,
        false,
        Tracer(Phase::DiffEttringite),
        0.008,
    ),
    product(Phase::Afm, "AFM", Bridging, false, Nothing, 0.0),
    product(Phase::Fh3, "FH3", Neither, false, Nothing, 0.0),
    product(Phase::PozzCsh, "POZZCSH", Bridging, false, Nothing, 0.0),
    product(Phase::SlagCsh, "SLAGCSH", Bridging, false, Nothing, 0.0),
    reactant(
        Phase::CaCl2,
        "CACL2",
        Neither,
        true,
        Tracer(Phase::DiffCaCl2),
        NO_BYPRODUCTS,
        0.5,
    ),
    product(Phase::Friedel, "FREIDEL", Bridging, false, Nothing, 0.0),
    product(Phase::Stratlingite, "STRAT", Bridging, false, Nothing, 0.0),
    product(
        Phase::GypsumS,
        "GYPSUMS",
        Neither,
        true,
        Tracer(Phase::DiffGypsum),
        0.05,
    ),
    reactant(
        Phase::CaCO3,
        "CACO3",
        Neither,
        true,
        Tracer(Phase::DiffCaCO3),
        NO_BYPRODUCTS,
        0.02,
    ),
    product(Phase::Afmc, "AFMC", Bridging, false, Nothing, 0.0),
    inert(Phase::InertAgg, "INERTAGG"),
    product(Phase::AbsGypsum, "ABSGYP", Neither, false, Nothing, 0.0),
    diffusing(Phase::DiffCsh, "DIFFCSH", Phase::Csh),
    diffusing(Phase::DiffCh, "DIFFCH", Phase::Ch),
    diffusing(Phase::DiffGypsum, "DIFFGYP", Phase::GypsumS),
    diffusing(Phase::DiffC3A, "DIFFC3A", Phase::C3AH6),
    diffusing(Phase::DiffC4A, "DIFFC4A", Phase::C3AH6),
    diffusing(Phase::DiffFh3, "DIFFFH3", Phase::Fh3),
    diffusing(Phase::DiffEttringite, "DIFFETTR", Phase::Ettringite),
    diffusing(Phase::DiffCaCO3, "DIFFCACO3", Phase::CaCO3),
    diffusing(Phase::DiffAs, "DIFFAS", Phase::Asg),
    diffusing(Phase::DiffAnhydrite, "DIFFANH", Phase::GypsumS),
    diffusing(Phase::DiffHemihydrate, "DIFFHEM", Phase::GypsumS),
    diffusing(Phase::DiffCas2, "DIFFCAS2", Phase::Cas2),
    diffusing(Phase::DiffCaCl2, "DIFFCACL2", Phase::CaCl2),
    diffusing(Phase::DiffSo4, "DIFFSO4", Phase::GypsumS),
    pore(Phase::EmptyPore, "EMPTYP"),
    pore(Phase::Crack, "CRACKP"),
];

/// Capability descriptor for `phase`.
#[inline]
pub fn spec(phase: Phase) -> &'static PhaseSpec {
    &PHASE_TABLE[phase.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows_are_in_id_order() {
        for phase in Phase::ALL {
            assert_eq!(spec(phase).phase, phase, "row for {:?} misplaced", phase);
        }
    }

    #[test]
    fn test_soluble_phases_create_something() {
        for phase in Phase::ALL {
            let row = spec(phase);
            if row.soluble {
                assert_ne!(row.creates, Creates::Nothing, "{} soluble but inert", row.name);
                assert!(row.dissolution_coefficient > 0.0);
            }
        }
    }

    #[test]
    fn test_tracers_created_are_diffusing() {
        for phase in Phase::ALL {
            let row = spec(phase);
            match row.creates {
                Creates::Tracer(kind) => assert!(kind.is_diffusing()),
                Creates::Split {
                    primary, secondary, ..
                } => {
                    assert!(primary.is_diffusing());
                    assert!(secondary.is_diffusing());
                }
                _ => {}
            }
            for &(kind, ratio) in row.byproducts {
                assert!(kind.is_diffusing());
                assert!(ratio > 0.0);
            }
        }
    }

    #[test]
    fn test_c4af_split_constants() {
        match spec(Phase::C4AF).creates {
            Creates::Split {
                primary_fraction, ..
            } => assert_eq!(primary_fraction, 0.6053),
            other => panic!("unexpected {:?}", other),
        }
    }
}
