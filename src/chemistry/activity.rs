//! Ion activity coefficients and pore-solution conductivity.

/// Debye–Hückel `A` at 25 °C [(L/mol)^½].
pub const DEBYE_A: f64 = 0.5114;
/// Debye–Hückel `B` at 25 °C [(L/mol)^½ Å⁻¹].
pub const DEBYE_B: f64 = 0.3288;
/// Truesdell–Jones linear term.
pub const B_DOT: f64 = 0.041;

/// One aqueous ion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ion {
    pub name: &'static str,
    pub charge: i32,
    /// Ion size parameter [Å].
    pub size: f64,
    /// Equivalent conductivity at infinite dilution [cm² S/eq].
    pub lambda0: f64,
    /// Conductivity fall-off with ionic strength [(L/mol)^½].
    pub g: f64,
}

pub const CA: Ion = Ion {
    name: "Ca",
    charge: 2,
    size: 5.0,
    lambda0: 59.5,
    g: 0.771,
};
pub const OH: Ion = Ion {
    name: "OH",
    charge: -1,
    size: 3.5,
    lambda0: 198.0,
    g: 0.353,
};
pub const SO4: Ion = Ion {
    name: "SO4",
    charge: -2,
    size: 5.0,
    lambda0: 80.0,
    g: 0.877,
};
pub const NA: Ion = Ion {
    name: "Na",
    charge: 1,
    size: 4.0,
    lambda0: 50.1,
    g: 0.733,
};
pub const K: Ion = Ion {
    name: "K",
    charge: 1,
    size: 3.0,
    lambda0: 73.5,
    g: 0.548,
};

impl Ion {
    /// Extended Debye–Hückel (Truesdell–Jones) activity coefficient.
    pub fn gamma(&self, ionic_strength: f64) -> f64 {
        let sqrt_i = ionic_strength.max(0.0).sqrt();
        let z2 = (self.charge * self.charge) as f64;
        let log_gamma = -DEBYE_A * z2 * sqrt_i / (1.0 + DEBYE_B * self.size * sqrt_i)
            + B_DOT * ionic_strength;
        10f64.powf(log_gamma)
    }

    /// Conductivity contribution [S/m] of `conc` mol/L of this ion.
    pub fn conductivity(&self, conc: f64, ionic_strength: f64) -> f64 {
        let z = self.charge.unsigned_abs() as f64;
        // z·c [eq/L] × λ [cm² S/eq] → 0.1 S/m per unit
        0.1 * z * conc * self.lambda0 / (1.0 + self.g * ionic_strength.max(0.0).sqrt())
    }
}

/// Activity coefficients for the five tracked ions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Activities {
    pub ca: f64,
    pub oh: f64,
    pub so4: f64,
    pub na: f64,
    pub k: f64,
}

impl Default for Activities {
    fn default() -> Self {
        Self::unity()
    }
}

impl Activities {
    pub fn unity() -> Self {
        Self {
            ca: 1.0,
            oh: 1.0,
            so4: 1.0,
            na: 1.0,
            k: 1.0,
        }
    }

    pub fn at(ionic_strength: f64) -> Self {
        Self {
            ca: CA.gamma(ionic_strength),
            oh: OH.gamma(ionic_strength),
            so4: SO4.gamma(ionic_strength),
            na: NA.gamma(ionic_strength),
            k: K.gamma(ionic_strength),
        }
    }
}

/// Molar ionic strength `½ Σ c z²`.
pub fn ionic_strength(ca: f64, oh: f64, so4: f64, na: f64, k: f64) -> f64 {
    0.5 * (4.0 * ca + oh + 4.0 * so4 + na + k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gamma_limits() {
        assert_eq!(CA.gamma(0.0), 1.0);
        // divalent ions deviate more than monovalent ones
        assert!(CA.gamma(0.1) < K.gamma(0.1));
        assert!(OH.gamma(0.1) < 1.0);
    }

    #[test]
    fn test_ionic_strength() {
        assert!((ionic_strength(0.0, 0.5, 0.0, 0.2, 0.3) - 0.5).abs() < 1e-12);
        assert!((ionic_strength(0.01, 0.0, 0.01, 0.0, 0.0) - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_conductivity_drops_with_strength() {
        let dilute = K.conductivity(0.1, 0.0);
        assert!((dilute - 0.735).abs() < 1e-12);
        assert!(K.conductivity(0.1, 0.5) < dilute);
    }
}
