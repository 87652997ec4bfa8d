//! Error taxonomy for the hydration model.
//!
//! Only setup and I/O can fail. Numeric non-convergence is logged and the last
//! estimate kept; failed extension placements are counted as strain.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to the caller. Everything here is fatal for a run.
#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("malformed image header: {0}")]
    BadHeader(String),

    #[error("unsupported image version '{0}'")]
    UnsupportedVersion(String),

    #[error("size mismatch: expected {expected} voxels, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("premature end of input in {context}: expected {expected} values, read {read}")]
    PrematureEof {
        context: &'static str,
        expected: usize,
        read: usize,
    },

    #[error("unknown phase id {id} for image version {version}")]
    UnknownPhase { id: u32, version: String },

    #[error("bad value for '{name}': '{value}'")]
    BadValue { name: String, value: String },

    #[error("parameter file out of order at position {position}: expected '{expected}', found '{found}'")]
    ParameterOrder {
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("calibration data invalid: {0}")]
    Calibration(String),

    #[error("configuration invalid: {0}")]
    Config(String),

    #[error("resource exhausted: {0}")]
    Exhausted(String),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HydrationError {
    /// Attach a path to an I/O failure.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HydrationError>;
