// ============================================================================
// Run configuration
//
// `SimulationConfig` holds everything about a run that is not a kinetic
// parameter: cycle count, seed, neighborhoods, curing, crack and deactivation
// schedules, chemistry of the mix, time model. It can be loaded from a TOML
// run file; missing keys fall back to the defaults below. Kinetic parameters
// live in `HydrationParams` and come from the ordered parameter file.
// ============================================================================

mod params;

pub use params::{HydrationParams, Nucleation, PhFit, PH_REFERENCE};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chemistry::ChemistryConfig;
use crate::clock::TimeConfig;
use crate::dissolution::DeactivationConfig;
use crate::error::{HydrationError, Result};
use crate::lattice::{Axis, Neighborhood};
use crate::phase::Phase;
use crate::water::Curing;

/// Crack opened once, mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrackConfig {
    /// Cycle at the start of which the crack opens.
    pub cycle: u32,
    /// Axis perpendicular to the crack plane.
    pub axis: Axis,
    /// Crack width in voxels.
    pub width: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub cycles:               u32,
    pub seed:                 u64,
    /// Neighbor set for surface detection in the dissolution pass.
    pub neighborhood:         Neighborhood,
    /// Inclusive phase-id range scanned by the dissolution pass.
    pub dissolution_range:    (u8, u8),
    /// Cycles between percolation checks (0 disables them).
    pub percolation_interval: u32,
    /// Cycles between lattice snapshots (0 disables them).
    pub snapshot_interval:    u32,
    /// Grow C-S-H as oriented plates.
    pub csh_plates:           bool,
    /// Let pore-solution pH scale dissolution rates.
    pub ph_feedback:          bool,
    pub curing:               Curing,
    pub time:                 TimeConfig,
    pub chemistry:            ChemistryConfig,
    pub crack:                Option<CrackConfig>,
    pub deactivation:         Vec<DeactivationConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycles:               1000,
            seed:                 42,
            neighborhood:         Neighborhood::TwentySix,
            dissolution_range:    (Phase::C3S.id(), Phase::AbsGypsum.id()),
            percolation_interval: 25,
            snapshot_interval:    0,
            csh_plates:           false,
            ph_feedback:          true,
            curing:               Curing::Saturated,
            time:                 TimeConfig::default(),
            chemistry:            ChemistryConfig::default(),
            crack:                None,
            deactivation:         Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HydrationError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Reject settings the passes cannot honor.
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = self.dissolution_range;
        if lo > hi || Phase::from_id(hi).is_none() {
            return Err(HydrationError::Config(format!(
                "dissolution range {lo}..={hi} is not a valid phase-id range"
            )));
        }
        if let Some(crack) = &self.crack {
            if crack.width == 0 {
                return Err(HydrationError::Config("crack width must be positive".into()));
            }
        }
        for d in &self.deactivation {
            if !(0.0..=1.0).contains(&d.fraction) || !(0.0..=1.0).contains(&d.reactivation_rate) {
                return Err(HydrationError::Config(format!(
                    "deactivation fractions for {} must lie in [0, 1]",
                    d.phase
                )));
            }
        }
        Ok(())
    }
}
