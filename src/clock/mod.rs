//! Cycle-to-time conversion.
//!
//! Either a parabolic law `t = beta * cycle²` or a calibration against a
//! measured heat (or chemical shrinkage) curve: the simulated value is mapped
//! to time by linear interpolation in the measured range and by a quadratic
//! through the last three points beyond it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::counters::PhaseCounters;
use crate::error::{HydrationError, Result};

/// Which measured quantity the calibration series holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CalibrationKind {
    /// Cumulative heat [J/g].
    #[default]
    Heat,
    /// Chemical shrinkage [mL/g].
    ChemicalShrinkage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Parabolic time constant [h per cycle²].
    pub beta: f64,
    /// Meaning of the values in a calibration file, when one is given.
    pub calibration: CalibrationKind,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            beta: 0.00035,
            calibration: CalibrationKind::Heat,
        }
    }
}

/// Measured `(time, value)` series, values non-decreasing.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSeries {
    time_h: Vec<f64>,
    value: Vec<f64>,
}

impl CalibrationSeries {
    pub fn new(time_h: Vec<f64>, value: Vec<f64>) -> Result<Self> {
        if time_h.len() != value.len() {
            return Err(HydrationError::Calibration(format!(
                "{} times but {} values",
                time_h.len(),
                value.len()
            )));
        }
        if time_h.len() < 2 {
            return Err(HydrationError::Calibration(
                "need at least two calibration points".into(),
            ));
        }
        let monotone = |v: &[f64]| v.windows(2).all(|w| w[1] >= w[0]);
        if !monotone(&time_h) || !monotone(&value) {
            return Err(HydrationError::Calibration(
                "times and values must be non-decreasing".into(),
            ));
        }
        Ok(Self { time_h, value })
    }

    pub fn len(&self) -> usize {
        self.time_h.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_h.is_empty()
    }

    /// Time [h] at which the measured curve reaches `value`.
    pub fn time_for(&self, value: f64) -> f64 {
        let v = &self.value;
        let t = &self.time_h;
        let n = v.len();
        if value <= 0.0 {
            return 0.0;
        }
        if value <= v[0] {
            return if v[0] > 0.0 { t[0] * value / v[0] } else { t[0] };
        }
        for i in 0..n - 1 {
            if value <= v[i + 1] {
                let span = v[i + 1] - v[i];
                if span <= 0.0 {
                    return t[i];
                }
                return t[i] + (t[i + 1] - t[i]) * (value - v[i]) / span;
            }
        }

        // beyond the measured range
        if n >= 3 {
            let (x, y) = (&v[n - 3..], &t[n - 3..]);
            if x[0] < x[1] && x[1] < x[2] {
                let mut out = 0.0;
                for j in 0..3 {
                    let mut term = y[j];
                    for m in 0..3 {
                        if m != j {
                            term *= (value - x[m]) / (x[j] - x[m]);
                        }
                    }
                    out += term;
                }
                return out.max(t[n - 1]);
            }
        }
        let span = v[n - 1] - v[n - 2];
        if span <= 0.0 {
            return t[n - 1];
        }
        t[n - 1] + (t[n - 1] - t[n - 2]) * (value - v[n - 1]) / span
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimeModel {
    Parabolic { beta: f64 },
    Calibrated {
        series: CalibrationSeries,
        kind: CalibrationKind,
    },
}

/// Tracks elapsed hydration time.
#[derive(Debug, Clone)]
pub struct HydrationClock {
    pub model: TimeModel,
    /// Elapsed time [h].
    pub time_h: f64,
}

impl HydrationClock {
    pub fn new(model: TimeModel) -> Self {
        Self { model, time_h: 0.0 }
    }

    /// Time after `cycle` cycles. Never runs backwards.
    pub fn advance(&mut self, cycle: u32, counters: &PhaseCounters) -> f64 {
        let t = match &self.model {
            TimeModel::Parabolic { beta } => beta * (cycle as f64) * (cycle as f64),
            TimeModel::Calibrated { series, kind } => {
                let simulated = match kind {
                    CalibrationKind::Heat => counters.heat_released(),
                    CalibrationKind::ChemicalShrinkage => counters.chemical_shrinkage(),
                };
                let t = series.time_for(simulated);
                debug!(cycle, simulated, time_h = t, "calibrated time");
                t
            }
        };
        self.time_h = self.time_h.max(t);
        self.time_h
    }
}
