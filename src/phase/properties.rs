//! Physical constants per phase.

use super::Phase;

/// Read-only physical data for one phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseProperties {
    /// Molar volume [cm³/mol].
    pub molar_volume: f64,
    /// Specific gravity [g/cm³].
    pub specific_gravity: f64,
    /// Heat released per gram reacted [J/g]. Clinker phases only.
    pub heat_of_hydration: f64,
    /// Chemical shrinkage per gram reacted [mL/g]. Clinker and sulfates only.
    pub chemical_shrinkage: f64,
    /// Chemically bound water per product voxel, as a volume fraction of the voxel.
    pub bound_water: f64,
}

impl PhaseProperties {
    const fn new(
        molar_volume: f64,
        specific_gravity: f64,
        heat_of_hydration: f64,
        chemical_shrinkage: f64,
        bound_water: f64,
    ) -> Self {
        Self {
            molar_volume,
            specific_gravity,
            heat_of_hydration,
            chemical_shrinkage,
            bound_water,
        }
    }

    /// Molar mass [g/mol].
    pub fn molar_mass(&self) -> f64 {
        self.molar_volume * self.specific_gravity
    }
}

const WATER: PhaseProperties = PhaseProperties::new(18.068, 1.0, 0.0, 0.0, 0.0);
const EMPTY: PhaseProperties = PhaseProperties::new(18.068, 0.0, 0.0, 0.0, 0.0);

static PROPERTIES: [PhaseProperties; Phase::COUNT] = [
    WATER,                                                    // POROSITY
    PhaseProperties::new(71.0, 3.21, 517.0, 0.0704, 0.0),     // C3S
    PhaseProperties::new(52.0, 3.28, 262.0, 0.0532, 0.0),     // C2S
    PhaseProperties::new(89.1, 3.03, 1144.0, 0.1113, 0.0),    // C3A
    PhaseProperties::new(128.0, 3.73, 418.0, 0.1112, 0.0),    // C4AF
    PhaseProperties::new(65.5, 2.66, 0.0, 0.0, 0.0),          // K2SO4
    PhaseProperties::new(53.0, 2.68, 0.0, 0.0, 0.0),          // NA2SO4
    PhaseProperties::new(74.2, 2.32, 0.0, 0.0, 0.0),          // GYPSUM
    PhaseProperties::new(52.9, 2.74, 0.0, 0.0, 0.0),          // HEMIHYD
    PhaseProperties::new(46.0, 2.61, 0.0, 0.0, 0.0),          // ANHYDRITE
    PhaseProperties::new(27.0, 2.22, 780.0, 0.2, 0.0),        // SFUME
    PhaseProperties::new(100.0, 2.6, 0.0, 0.0, 0.0),          // INERT
    PhaseProperties::new(945.72, 2.87, 461.0, 0.0, 0.0),      // SLAG
    PhaseProperties::new(100.0, 3.247, 0.0, 0.0, 0.0),        // ASG
    PhaseProperties::new(100.62, 2.77, 0.0, 0.0, 0.0),        // CAS2
    PhaseProperties::new(33.1, 2.24, 0.0, 0.0, 0.54),         // CH
    PhaseProperties::new(108.0, 2.12, 0.0, 0.0, 0.53),        // CSH
    PhaseProperties::new(150.0, 2.52, 0.0, 0.0, 0.36),        // C3AH6
    PhaseProperties::new(735.0, 1.7, 0.0, 0.0, 0.63),         // ETTR
    PhaseProperties::new(735.0, 1.7, 0.0, 0.0, 0.63),         // ETTRC4AF
    PhaseProperties::new(313.0, 1.99, 0.0, 0.0, 0.44),        // AFM
    PhaseProperties::new(69.8, 3.0, 0.0, 0.0, 0.46),          // FH3
    PhaseProperties::new(101.81, 2.29, 0.0, 0.0, 0.5),        // POZZCSH
    PhaseProperties::new(101.81, 2.35, 0.0, 0.0, 0.5),        // SLAGCSH
    PhaseProperties::new(51.62, 2.15, 0.0, 0.0, 0.0),         // CACL2
    PhaseProperties::new(296.66, 1.892, 0.0, 0.0, 0.43),      // FREIDEL
    PhaseProperties::new(215.63, 1.94, 0.0, 0.0, 0.58),       // STRAT
    PhaseProperties::new(74.2, 2.32, 0.0, 0.0, 0.49),         // GYPSUMS
    PhaseProperties::new(36.93, 2.71, 0.0, 0.0, 0.0),         // CACO3
    PhaseProperties::new(261.91, 2.17, 0.0, 0.0, 0.4),        // AFMC
    PhaseProperties::new(100.0, 2.6, 0.0, 0.0, 0.0),          // INERTAGG
    PhaseProperties::new(74.2, 2.32, 0.0, 0.0, 0.0),          // ABSGYP
    WATER,                                                    // DIFFCSH
    WATER,                                                    // DIFFCH
    WATER,                                                    // DIFFGYP
    WATER,                                                    // DIFFC3A
    WATER,                                                    // DIFFC4A
    WATER,                                                    // DIFFFH3
    WATER,                                                    // DIFFETTR
    WATER,                                                    // DIFFCACO3
    WATER,                                                    // DIFFAS
    WATER,                                                    // DIFFANH
    WATER,                                                    // DIFFHEM
    WATER,                                                    // DIFFCAS2
    WATER,                                                    // DIFFCACL2
    WATER,                                                    // DIFFSO4
    EMPTY,                                                    // EMPTYP
    WATER,                                                    // CRACKP
];

/// Physical constants for `phase`.
#[inline]
pub fn properties(phase: Phase) -> &'static PhaseProperties {
    &PROPERTIES[phase.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pore_space_is_water() {
        assert_eq!(properties(Phase::Porosity).specific_gravity, 1.0);
        assert_eq!(properties(Phase::EmptyPore).specific_gravity, 0.0);
        // diffusing species live in solution
        assert_eq!(properties(Phase::DiffCh).specific_gravity, 1.0);
    }

    #[test]
    fn test_only_reactants_release_heat() {
        for phase in Phase::ALL {
            if properties(phase).heat_of_hydration > 0.0 {
                assert!(phase.is_solid(), "{phase} releases heat but is not solid");
            }
        }
        assert!((properties(Phase::C3S).molar_mass() - 227.91).abs() < 0.1);
    }
}
