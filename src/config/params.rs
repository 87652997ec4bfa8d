//! Kinetic hydration parameters and the ordered parameter file.
//!
//! The file is whitespace-delimited `name value` pairs in a fixed order. A
//! leading `Version <tag>` pair selects the order table; files without it are
//! read with the legacy 2.0 table.

use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::counters::CshAging;
use crate::error::{HydrationError, Result};
use crate::phase::{spec, Phase};

/// Reference pH at which every pH fit evaluates to its constant term.
pub const PH_REFERENCE: f64 = 12.5;

/// Nucleation law for one diffusing species:
/// `probability * (1 - exp(-live / saturation))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nucleation {
    pub probability: f64,
    pub saturation: f64,
}

impl Nucleation {
    #[inline]
    pub fn probability_at(&self, live: usize) -> f64 {
        if self.saturation <= 0.0 {
            return self.probability;
        }
        self.probability * (1.0 - (-(live as f64) / self.saturation).exp())
    }
}

/// Quadratic pH response of a dissolution rate, centered on [`PH_REFERENCE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhFit {
    pub c0: f64,
    pub c1: f64,
    pub c2: f64,
}

impl Default for PhFit {
    fn default() -> Self {
        Self {
            c0: 1.0,
            c1: 0.0,
            c2: 0.0,
        }
    }
}

impl PhFit {
    /// Multiplier on the dissolution probability, clamped to `[0, 10]`.
    pub fn factor(&self, ph: f64) -> f64 {
        let d = ph - PH_REFERENCE;
        (self.c0 + self.c1 * d + self.c2 * d * d).clamp(0.0, 10.0)
    }
}

/// Kinetic parameters overlaid from the parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationParams {
    /// Global multiplier on every dissolution probability.
    pub dissolution_bias: f64,
    /// Extra multiplier for single-voxel particles with no solid neighbor.
    pub one_voxel_bias: f64,
    /// C-S-H voxel count beyond which C3S/C2S dissolution becomes diffusion limited.
    /// Absolute count, so the onset depends on system size.
    pub csh_scale: f64,
    /// C3A/C4AF dissolution multiplier while solid sulfate remains.
    pub c3a_sulfate_factor: f64,
    /// Diffusion steps per cycle.
    pub diffusion_steps: u32,

    pub nucleation_ch: Nucleation,
    pub nucleation_gypsum: Nucleation,
    pub nucleation_c3ah6: Nucleation,
    pub nucleation_fh3: Nucleation,

    /// Base dissolution coefficient per phase id.
    pub dissolution: Vec<f64>,
    /// pH response per phase id.
    pub ph_fits: Vec<PhFit>,

    pub csh_aging: CshAging,
}

impl Default for HydrationParams {
    fn default() -> Self {
        Self {
            dissolution_bias: 1.0,
            one_voxel_bias: 1.0,
            csh_scale: 70_000.0,
            c3a_sulfate_factor: 0.1,
            diffusion_steps: 500,
            nucleation_ch: Nucleation {
                probability: 0.0001,
                saturation: 1000.0,
            },
            nucleation_gypsum: Nucleation {
                probability: 0.01,
                saturation: 2000.0,
            },
            nucleation_c3ah6: Nucleation {
                probability: 0.00002,
                saturation: 2500.0,
            },
            nucleation_fh3: Nucleation {
                probability: 0.002,
                saturation: 2000.0,
            },
            dissolution: Phase::ALL
                .iter()
                .map(|&p| spec(p).dissolution_coefficient)
                .collect(),
            ph_fits: vec![PhFit::default(); Phase::COUNT],
            csh_aging: CshAging::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ordered file tables
// ---------------------------------------------------------------------------

const PARAMS_V2: &[&str] = &[
    "dissolution_bias",
    "one_voxel_bias",
    "csh_scale",
    "c3a_sulfate_factor",
    "diffusion_steps",
    "nuc_prob_ch",
    "nuc_sat_ch",
    "nuc_prob_gypsum",
    "nuc_sat_gypsum",
    "nuc_prob_c3ah6",
    "nuc_sat_c3ah6",
    "nuc_prob_fh3",
    "nuc_sat_fh3",
    "dis_C3S",
    "dis_C2S",
    "dis_C3A",
    "dis_C4AF",
    "dis_GYPSUM",
    "dis_HEMIHYD",
    "dis_ANHYDRITE",
    "dis_ETTR",
    "dis_CACO3",
    "dis_CACL2",
    "dis_ASG",
    "dis_CAS2",
    "csh_age_gel_porosity",
    "csh_age_cycles",
];

const PARAMS_V3: &[&str] = &[
    "dissolution_bias",
    "one_voxel_bias",
    "csh_scale",
    "c3a_sulfate_factor",
    "diffusion_steps",
    "nuc_prob_ch",
    "nuc_sat_ch",
    "nuc_prob_gypsum",
    "nuc_sat_gypsum",
    "nuc_prob_c3ah6",
    "nuc_sat_c3ah6",
    "nuc_prob_fh3",
    "nuc_sat_fh3",
    "dis_C3S",
    "dis_C2S",
    "dis_C3A",
    "dis_C4AF",
    "dis_K2SO4",
    "dis_NA2SO4",
    "dis_GYPSUM",
    "dis_HEMIHYD",
    "dis_ANHYDRITE",
    "dis_ETTR",
    "dis_CACO3",
    "dis_CACL2",
    "dis_ASG",
    "dis_CAS2",
    "ph_C3S_0",
    "ph_C3S_1",
    "ph_C3S_2",
    "ph_C2S_0",
    "ph_C2S_1",
    "ph_C2S_2",
    "ph_C3A_0",
    "ph_C3A_1",
    "ph_C3A_2",
    "ph_C4AF_0",
    "ph_C4AF_1",
    "ph_C4AF_2",
    "ph_GYPSUM_0",
    "ph_GYPSUM_1",
    "ph_GYPSUM_2",
    "csh_age_gel_porosity",
    "csh_age_cycles",
];

fn order_for(version: &str) -> Option<&'static [&'static str]> {
    match version {
        "2.0" => Some(PARAMS_V2),
        "3.0" => Some(PARAMS_V3),
        _ => None,
    }
}

fn parse_value(name: &str, value: &str) -> Result<f64> {
    value.parse::<f64>().map_err(|_| HydrationError::BadValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

impl HydrationParams {
    /// Set one named parameter.
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        let bad = || HydrationError::BadValue {
            name: name.to_string(),
            value: value.to_string(),
        };
        match name {
            "dissolution_bias" => self.dissolution_bias = value,
            "one_voxel_bias" => self.one_voxel_bias = value,
            "csh_scale" => self.csh_scale = value,
            "c3a_sulfate_factor" => self.c3a_sulfate_factor = value,
            "diffusion_steps" => {
                if value < 0.0 || value.fract() != 0.0 {
                    return Err(bad());
                }
                self.diffusion_steps = value as u32;
            }
            "nuc_prob_ch" => self.nucleation_ch.probability = value,
            "nuc_sat_ch" => self.nucleation_ch.saturation = value,
            "nuc_prob_gypsum" => self.nucleation_gypsum.probability = value,
            "nuc_sat_gypsum" => self.nucleation_gypsum.saturation = value,
            "nuc_prob_c3ah6" => self.nucleation_c3ah6.probability = value,
            "nuc_sat_c3ah6" => self.nucleation_c3ah6.saturation = value,
            "nuc_prob_fh3" => self.nucleation_fh3.probability = value,
            "nuc_sat_fh3" => self.nucleation_fh3.saturation = value,
            "csh_age_gel_porosity" => self.csh_aging.initial_gel_porosity = value,
            "csh_age_cycles" => self.csh_aging.decay_cycles = value,
            other => {
                if let Some(phase) = other.strip_prefix("dis_").and_then(Phase::from_name) {
                    *self.dissolution.get_mut(phase.index()).ok_or_else(bad)? = value;
                } else if let Some(rest) = other.strip_prefix("ph_") {
                    let (phase, term) = rest.rsplit_once('_').ok_or_else(bad)?;
                    let phase = Phase::from_name(phase).ok_or_else(bad)?;
                    let fit = self.ph_fits.get_mut(phase.index()).ok_or_else(bad)?;
                    match term {
                        "0" => fit.c0 = value,
                        "1" => fit.c1 = value,
                        "2" => fit.c2 = value,
                        _ => return Err(bad()),
                    }
                } else {
                    return Err(bad());
                }
            }
        }
        Ok(())
    }

    /// Current value of one named parameter.
    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "dissolution_bias" => self.dissolution_bias,
            "one_voxel_bias" => self.one_voxel_bias,
            "csh_scale" => self.csh_scale,
            "c3a_sulfate_factor" => self.c3a_sulfate_factor,
            "diffusion_steps" => self.diffusion_steps as f64,
            "nuc_prob_ch" => self.nucleation_ch.probability,
            "nuc_sat_ch" => self.nucleation_ch.saturation,
            "nuc_prob_gypsum" => self.nucleation_gypsum.probability,
            "nuc_sat_gypsum" => self.nucleation_gypsum.saturation,
            "nuc_prob_c3ah6" => self.nucleation_c3ah6.probability,
            "nuc_sat_c3ah6" => self.nucleation_c3ah6.saturation,
            "nuc_prob_fh3" => self.nucleation_fh3.probability,
            "nuc_sat_fh3" => self.nucleation_fh3.saturation,
            "csh_age_gel_porosity" => self.csh_aging.initial_gel_porosity,
            "csh_age_cycles" => self.csh_aging.decay_cycles,
            other => {
                if let Some(phase) = other.strip_prefix("dis_").and_then(Phase::from_name) {
                    *self.dissolution.get(phase.index())?
                } else {
                    let (phase, term) = other.strip_prefix("ph_")?.rsplit_once('_')?;
                    let fit = *self.ph_fits.get(Phase::from_name(phase)?.index())?;
                    match term {
                        "0" => fit.c0,
                        "1" => fit.c1,
                        "2" => fit.c2,
                        _ => return None,
                    }
                }
            }
        };
        Some(value)
    }

    /// Reject per-phase tables that do not cover every phase id.
    pub fn validate(&self) -> Result<()> {
        let tables = [
            ("dissolution", self.dissolution.len()),
            ("ph_fits", self.ph_fits.len()),
        ];
        for (name, len) in tables {
            if len != Phase::COUNT {
                return Err(HydrationError::Config(format!(
                    "{name} has {len} entries, expected one per phase ({})",
                    Phase::COUNT
                )));
            }
        }
        Ok(())
    }

    /// Parse an ordered parameter file, overlaying the defaults.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut tokens = text.split_whitespace().peekable();

        let (version, order) = if tokens.peek().map_or(false, |t| t.eq_ignore_ascii_case("version")) {
            tokens.next();
            let tag = tokens.next().ok_or(HydrationError::PrematureEof {
                context: "parameter file version",
                expected: 1,
                read: 0,
            })?;
            let order =
                order_for(tag).ok_or_else(|| HydrationError::UnsupportedVersion(tag.to_string()))?;
            (tag.to_string(), order)
        } else {
            ("2.0".to_string(), PARAMS_V2)
        };

        let mut params = Self::default();
        for (position, &expected) in order.iter().enumerate() {
            let eof = || HydrationError::PrematureEof {
                context: "parameter file",
                expected: order.len(),
                read: position,
            };
            let name = tokens.next().ok_or_else(eof)?;
            let value = tokens.next().ok_or_else(eof)?;
            if name != expected {
                return Err(HydrationError::ParameterOrder {
                    position,
                    expected,
                    found: name.to_string(),
                });
            }
            params.set(name, parse_value(name, value)?)?;
        }

        let extra = tokens.count();
        if extra > 0 {
            warn!(extra, "ignoring trailing tokens in parameter file");
        }
        debug!(version = %version, count = order.len(), "parameter file read");
        Ok(params)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| HydrationError::io(path, e))?;
        Self::read(std::io::BufReader::new(file))
    }

    /// Write the current parameters in version 3.0 order.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "Version 3.0")?;
        for &name in PARAMS_V3 {
            // every name in the table is known to `get`
            if let Some(value) = self.get(name) {
                writeln!(writer, "{name} {value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nucleation_saturates() {
        let n = Nucleation {
            probability: 0.5,
            saturation: 10.0,
        };
        assert_eq!(n.probability_at(0), 0.0);
        assert!(n.probability_at(10) < n.probability_at(100));
        assert!((n.probability_at(100_000) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_ph_fit_is_neutral_by_default() {
        assert_eq!(PhFit::default().factor(13.4), 1.0);
        let steep = PhFit {
            c0: 1.0,
            c1: 100.0,
            c2: 0.0,
        };
        assert_eq!(steep.factor(14.0), 10.0);
        assert_eq!(steep.factor(11.0), 0.0);
    }

    #[test]
    fn test_every_table_name_is_known() {
        let mut params = HydrationParams::default();
        for &name in PARAMS_V2.iter().chain(PARAMS_V3) {
            assert!(params.get(name).is_some(), "unknown {name}");
            params.set(name, 1.0).unwrap();
        }
    }

    #[test]
    fn test_written_file_reads_back() {
        let mut params = HydrationParams::default();
        params.set("dis_C3S", 0.55).unwrap();
        params.set("ph_C3A_1", -0.25).unwrap();
        params.set("diffusion_steps", 120.0).unwrap();
        let mut buf = Vec::new();
        params.write(&mut buf).unwrap();
        let back = HydrationParams::read(buf.as_slice()).unwrap();
        assert_eq!(back.dissolution[Phase::C3S.index()], 0.55);
        assert_eq!(back.ph_fits[Phase::C3A.index()].c1, -0.25);
        assert_eq!(back.diffusion_steps, 120);
    }

    #[test]
    fn test_out_of_order_name_is_fatal() {
        let text = "Version 3.0\none_voxel_bias 1.0\ndissolution_bias 1.0\n";
        match HydrationParams::read(text.as_bytes()) {
            Err(HydrationError::ParameterOrder {
                position, expected, ..
            }) => {
                assert_eq!(position, 0);
                assert_eq!(expected, "dissolution_bias");
            }
            other => panic!("expected order error, got {:?}", other),
        }
    }

    #[test]
    fn test_premature_eof_is_fatal() {
        let text = "dissolution_bias 1.0\none_voxel_bias 2.0\n";
        match HydrationParams::read(text.as_bytes()) {
            Err(HydrationError::PrematureEof { read, .. }) => assert_eq!(read, 2),
            other => panic!("expected EOF error, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_file_without_version() {
        let mut text = String::new();
        for &name in PARAMS_V2 {
            let value = if name == "diffusion_steps" { "250" } else { "0.5" };
            text.push_str(&format!("{name} {value}\n"));
        }
        let params = HydrationParams::read(text.as_bytes()).unwrap();
        assert_eq!(params.diffusion_steps, 250);
        assert_eq!(params.one_voxel_bias, 0.5);
        // alkali sulfates keep their table defaults in legacy files
        assert_eq!(params.dissolution[Phase::K2SO4.index()], 1.0);
    }

    #[test]
    fn test_short_phase_tables_are_rejected() {
        let mut params = HydrationParams::default();
        assert!(params.validate().is_ok());
        params.dissolution.truncate(3);
        assert!(matches!(params.validate(), Err(HydrationError::Config(_))));
        assert!(matches!(
            params.set("dis_GYPSUM", 0.5),
            Err(HydrationError::BadValue { .. })
        ));
        assert_eq!(params.get("dis_GYPSUM"), None);
        assert_eq!(params.get("dis_C3S"), Some(params.dissolution[Phase::C3S.index()]));

        let mut params = HydrationParams::default();
        params.ph_fits.clear();
        assert!(params.validate().is_err());
        assert_eq!(params.get("ph_C3S_0"), None);
        assert!(params.set("ph_C3S_0", 2.0).is_err());
    }

    #[test]
    fn test_bad_value() {
        let text = "Version 3.0\ndissolution_bias fast\n";
        assert!(matches!(
            HydrationParams::read(text.as_bytes()),
            Err(HydrationError::BadValue { .. })
        ));
    }
}
