//! Calorimetry / shrinkage calibration file: one header line, then
//! `time value` pairs, one per line. Blank lines are skipped.

use std::io::BufRead;
use std::path::Path;

use tracing::info;

use crate::clock::CalibrationSeries;
use crate::error::{HydrationError, Result};

fn number(name: &str, token: &str) -> Result<f64> {
    token.parse::<f64>().map_err(|_| HydrationError::BadValue {
        name: name.to_string(),
        value: token.to_string(),
    })
}

pub fn read_calibration<R: BufRead>(reader: R) -> Result<CalibrationSeries> {
    let mut lines = reader.lines();
    // header
    if lines.next().transpose()?.is_none() {
        return Err(HydrationError::Calibration("empty calibration file".into()));
    }

    let mut time_h = Vec::new();
    let mut value = Vec::new();
    for line in lines {
        let line = line?;
        let mut fields = line.split_whitespace();
        let Some(t) = fields.next() else { continue };
        let v = fields.next().ok_or(HydrationError::PrematureEof {
            context: "calibration pair",
            expected: 2,
            read: 1,
        })?;
        time_h.push(number("time", t)?);
        value.push(number("value", v)?);
    }
    CalibrationSeries::new(time_h, value)
}

pub fn load_calibration(path: &Path) -> Result<CalibrationSeries> {
    let file = std::fs::File::open(path).map_err(|e| HydrationError::io(path, e))?;
    let series = read_calibration(std::io::BufReader::new(file))?;
    info!(path = %path.display(), points = series.len(), "calibration loaded");
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_skipped() {
        let text = "time(h) heat(kJ/kg)\n1.0 10.0\n2.0 25.0\n\n4.0 60.0\n";
        let series = read_calibration(text.as_bytes()).unwrap();
        assert_eq!(series.len(), 3);
        assert!((series.time_for(25.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_half_pair_is_eof() {
        let text = "hdr\n1.0 10.0\n2.0\n";
        assert!(matches!(
            read_calibration(text.as_bytes()),
            Err(HydrationError::PrematureEof { .. })
        ));
    }

    #[test]
    fn test_bad_number() {
        let text = "hdr\n1.0 ten\n2.0 20.0\n";
        assert!(matches!(
            read_calibration(text.as_bytes()),
            Err(HydrationError::BadValue { .. })
        ));
    }
}
