//! Error taxonomy for the detection core.
//!
//! Three families, three recovery policies:
//! - [`SensorReadError`]: transient. The engine substitutes the last known
//!   value and counts the fault; it never reaches the alarm logic.
//! - [`ConfigLoadError`]: fatal at startup. Detection must not run with an
//!   undefined threshold.
//! - [`OutputDriveError`]: logged. The alarm state machine still transitions.

use std::path::PathBuf;

use thiserror::Error;

/// A failed or invalid raw sensor read.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorReadError {
    /// The underlying hardware or trace source failed.
    #[error("sensor I/O failure: {0}")]
    Io(String),

    /// Reading fell outside the physically valid range.
    #[error("light reading {value} outside valid range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// Reading was NaN or infinite.
    #[error("light reading is not a finite number")]
    NotFinite,

    /// Read took longer than one sample period.
    #[error("sensor read took {elapsed_ms}ms, budget is {budget_ms}ms")]
    Timeout { elapsed_ms: u64, budget_ms: u64 },

    /// A finite trace source has no more samples.
    #[error("sensor source exhausted")]
    Exhausted,
}

/// Failure to produce a usable [`RuntimeConfig`](crate::config::RuntimeConfig).
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("calibration artifact is missing required key {0}")]
    MissingKey(String),

    #[error("calibration key {key} has non-numeric value '{value}'")]
    BadValue { key: String, value: String },
}

/// The physical alarm output could not be driven.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputDriveError {
    #[error("alarm output I/O failure: {0}")]
    Io(String),

    #[error("alarm output disconnected")]
    Disconnected,
}

pub type ConfigResult<T> = Result<T, ConfigLoadError>;
