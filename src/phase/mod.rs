//! Phase identifiers and per-phase lookup tables.
//!
//! Every voxel carries one [`Phase`]. The numeric discriminant is the current
//! (version 3) on-disk phase id; older image versions are remapped by the
//! decoder table in `io::image`.
//!
//! Two static tables hang off the phase id:
//! - [`properties`]: physical constants (molar volume, specific gravity,
//!   heat of hydration, bound water, chemical shrinkage).
//! - [`spec`]: capability descriptors (class, default solubility, what the
//!   phase creates on dissolution, byproduct tracers, set class).

mod properties;
mod table;

pub use properties::{properties, PhaseProperties};
pub use table::{
    spec, Creates, PhaseSpec, SetClass, C2S_CH_RATIO, C2S_CSH_RATIO, C3S_CH_RATIO,
    C4AF_ALUMINATE_FRACTION, C4AF_CH_RATIO, K2SO4_SO4_RATIO, NA2SO4_SO4_RATIO,
};

use serde::{Deserialize, Serialize};

/// Phase identifier. The discriminant is the version 3 image id.
#[allow(clippy::upper_case_acronyms)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Phase {
    /// Saturated capillary porosity.
    #[default]
    Porosity = 0,
    C3S = 1,
    C2S = 2,
    C3A = 3,
    C4AF = 4,
    K2SO4 = 5,
    Na2SO4 = 6,
    Gypsum = 7,
    Hemihydrate = 8,
    Anhydrite = 9,
    SilicaFume = 10,
    Inert = 11,
    Slag = 12,
    /// Aluminosilicate glass (fly-ash equivalent).
    Asg = 13,
    /// Calcium aluminodisilicate.
    Cas2 = 14,
    Ch = 15,
    Csh = 16,
    C3AH6 = 17,
    Ettringite = 18,
    /// Iron-substituted ettringite formed from C4AF.
    EttringiteC4AF = 19,
    /// Monosulfoaluminate.
    Afm = 20,
    Fh3 = 21,
    PozzCsh = 22,
    SlagCsh = 23,
    CaCl2 = 24,
    Friedel = 25,
    Stratlingite = 26,
    /// Secondary (reprecipitated) gypsum.
    GypsumS = 27,
    CaCO3 = 28,
    /// Monocarboaluminate.
    Afmc = 29,
    InertAgg = 30,
    /// Gypsum absorbed on C-S-H.
    AbsGypsum = 31,
    DiffCsh = 32,
    DiffCh = 33,
    DiffGypsum = 34,
    DiffC3A = 35,
    DiffC4A = 36,
    DiffFh3 = 37,
    DiffEttringite = 38,
    DiffCaCO3 = 39,
    DiffAs = 40,
    DiffAnhydrite = 41,
    DiffHemihydrate = 42,
    DiffCas2 = 43,
    DiffCaCl2 = 44,
    DiffSo4 = 45,
    /// Self-desiccated (emptied) porosity.
    EmptyPore = 46,
    /// Crack porosity.
    Crack = 47,
}

/// Coarse classification used by the passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseClass {
    Pore,
    Reactant,
    Inert,
    Product,
    Diffusing,
}

impl Phase {
    pub const COUNT: usize = 48;

    /// All phases, indexed by id.
    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::Porosity,
        Phase::C3S,
        Phase::C2S,
        Phase::C3A,
        Phase::C4AF,
        Phase::K2SO4,
        Phase::Na2SO4,
        Phase::Gypsum,
        Phase::Hemihydrate,
        Phase::Anhydrite,
        Phase::SilicaFume,
        Phase::Inert,
        Phase::Slag,
        Phase::Asg,
        Phase::Cas2,
        Phase::Ch,
        Phase::Csh,
        Phase::C3AH6,
        Phase::Ettringite,
        Phase::EttringiteC4AF,
        Phase::Afm,
        Phase::Fh3,
        Phase::PozzCsh,
        Phase::SlagCsh,
        Phase::CaCl2,
        Phase::Friedel,
        Phase::Stratlingite,
        Phase::GypsumS,
        Phase::CaCO3,
        Phase::Afmc,
        Phase::InertAgg,
        Phase::AbsGypsum,
        Phase::DiffCsh,
        Phase::DiffCh,
        Phase::DiffGypsum,
        Phase::DiffC3A,
        Phase::DiffC4A,
        Phase::DiffFh3,
        Phase::DiffEttringite,
        Phase::DiffCaCO3,
        Phase::DiffAs,
        Phase::DiffAnhydrite,
        Phase::DiffHemihydrate,
        Phase::DiffCas2,
        Phase::DiffCaCl2,
        Phase::DiffSo4,
        Phase::EmptyPore,
        Phase::Crack,
    ];

    /// Clinker phases counted in the degree of hydration.
    pub const CLINKER: [Phase; 4] = [Phase::C3S, Phase::C2S, Phase::C3A, Phase::C4AF];

    /// Solid calcium-sulfate sources.
    pub const SULFATE_SOURCES: [Phase; 4] = [
        Phase::Gypsum,
        Phase::GypsumS,
        Phase::Hemihydrate,
        Phase::Anhydrite,
    ];

    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_id(id: u8) -> Option<Phase> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn name(self) -> &'static str {
        spec(self).name
    }

    /// Look a phase up by its table name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Phase> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    #[inline]
    pub fn class(self) -> PhaseClass {
        spec(self).class
    }

    #[inline]
    pub fn is_diffusing(self) -> bool {
        self.class() == PhaseClass::Diffusing
    }

    /// Any pore class: saturated, crack or emptied.
    #[inline]
    pub fn is_pore(self) -> bool {
        matches!(self, Phase::Porosity | Phase::Crack | Phase::EmptyPore)
    }

    /// Water-filled pore space a tracer may move into.
    #[inline]
    pub fn is_saturated_pore(self) -> bool {
        matches!(self, Phase::Porosity | Phase::Crack)
    }

    #[inline]
    pub fn is_solid(self) -> bool {
        !self.is_pore() && !self.is_diffusing()
    }

    /// Stable solid a diffusing species turns into when it nucleates.
    #[inline]
    pub fn solid_form(self) -> Option<Phase> {
        spec(self).solid_form
    }

    /// C-S-H family, used for gel porosity and alkali binding.
    #[inline]
    pub fn is_csh(self) -> bool {
        matches!(self, Phase::Csh | Phase::PozzCsh | Phase::SlagCsh)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_match_table_order() {
        for (i, phase) in Phase::ALL.iter().enumerate() {
            assert_eq!(phase.index(), i);
            assert_eq!(Phase::from_id(i as u8), Some(*phase));
        }
        assert_eq!(Phase::from_id(Phase::COUNT as u8), None);
    }

    #[test]
    fn test_classes() {
        assert!(Phase::Porosity.is_saturated_pore());
        assert!(Phase::Crack.is_saturated_pore());
        assert!(Phase::EmptyPore.is_pore());
        assert!(!Phase::EmptyPore.is_saturated_pore());
        assert!(Phase::DiffCh.is_diffusing());
        assert!(!Phase::DiffCh.is_solid());
        assert!(Phase::C3S.is_solid());
        assert_eq!(Phase::C3S.class(), PhaseClass::Reactant);
        assert_eq!(Phase::Csh.class(), PhaseClass::Product);
    }

    #[test]
    fn test_every_diffusing_species_has_a_solid_form() {
        for phase in Phase::ALL {
            if phase.is_diffusing() {
                let solid = phase.solid_form().expect("diffusing phase without solid form");
                assert!(solid.is_solid(), "{phase} nucleates as non-solid {solid}");
            }
        }
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(Phase::from_name("c3s"), Some(Phase::C3S));
        assert_eq!(Phase::from_name("DIFFCH"), Some(Phase::DiffCh));
        assert_eq!(Phase::from_name("nonsense"), None);
    }
}
