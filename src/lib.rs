//! Tamper Sense Detection Core
//!
//! Intrusion detection for a small sealed enclosure. A photocell notices the
//! lid being opened, a tilt switch notices the box being moved, and a buzzer
//! sounds once the evidence is sustained. A remote kill switch silences it.
//!
//! # Pipeline
//!
//! Every sample period (20Hz by default) the [`DetectionEngine`]:
//! - smooths the light reading ([`signal::SignalSmoother`])
//! - debounces tilt edges ([`debounce::EdgeDebouncer`])
//! - counts edges in a sliding window ([`pattern::PatternWindow`])
//! - fuses both into a verdict ([`classifier::AnomalyClassifier`])
//! - applies hysteresis to the buzzer ([`alarm::AlarmController`])
//! - publishes a [`SystemSnapshot`] through a [`ControlHandle`]
//!
//! Sensor faults degrade health but never stop the loop. Only configuration
//! errors are fatal.
//!
//! # Example
//!
//! ```ignore
//! use tamper_sense::{DetectionEngine, RuntimeConfig};
//! use tamper_sense::sensor::{LogAlarm, QuietSensor};
//!
//! let mut engine = DetectionEngine::new(
//!     RuntimeConfig::default(),
//!     QuietSensor::default(),
//!     LogAlarm::default(),
//! )?;
//! let control = engine.control();
//!
//! engine.tick(0);
//! assert!(!control.get_snapshot().alarm_active);
//! ```

pub mod alarm;
pub mod classifier;
pub mod config;
pub mod control;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod scheduler;
pub mod sensor;
pub mod signal;
pub mod snapshot;
pub mod types;

#[cfg(test)]
mod integration_tests;

// Re-export commonly used types
pub use config::{CalibrationArtifact, RuntimeConfig};
pub use engine::DetectionEngine;
pub use error::{ConfigLoadError, OutputDriveError, SensorReadError};
pub use snapshot::ControlHandle;
pub use types::{
    AlarmPhase, AlarmState, AnomalyReason, AnomalyVerdict, ReasonSet, SensorHealth,
    SystemSnapshot,
};
