//! Runtime configuration for the detection core.
//!
//! A [`RuntimeConfig`] is built once at startup and never mutated afterwards.
//! Sources, in order of precedence (last wins):
//! 1. Built-in defaults (the constants the device ships with)
//! 2. A TOML file (`RuntimeConfig::from_file`)
//! 3. `TAMPER_*` environment variables (`with_env_overrides`)
//! 4. A calibration artifact supplying the light threshold (`with_calibration`)
//!
//! Call [`RuntimeConfig::validate`] before handing the config to the engine.
//!
//! ```toml
//! light_threshold_v = 0.495627
//! smoothing_window = 3
//! transition_threshold = 3
//! pattern_window_ms = 2000
//! debounce_ms = 50
//! consecutive_alerts = 2
//! sample_period_ms = 50
//! ```

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigLoadError, ConfigResult};

/// Largest smoothing window or transition buffer a config may ask for.
pub const MAX_BUFFER_LEN: usize = 1024;

/// Immutable tuning parameters for every detection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Smoothed light above this voltage is anomalous (strict inequality).
    pub light_threshold_v: f64,

    /// Number of raw light readings averaged by the smoother.
    pub smoothing_window: usize,

    /// Accepted tilt transitions inside the pattern window that count as a shake.
    pub transition_threshold: usize,

    /// Trailing window over which tilt transitions are counted (ms).
    pub pattern_window_ms: u64,

    /// Minimum spacing between accepted tilt transitions (ms).
    pub debounce_ms: u64,

    /// Consecutive anomalous ticks required before the alarm sounds.
    pub consecutive_alerts: u32,

    /// Detection loop period (ms). 50ms = 20Hz.
    pub sample_period_ms: u64,

    /// Consecutive failed sensor reads at which health becomes Critical.
    pub sensor_fault_critical: u32,

    /// Extra slots in the transition buffer beyond `transition_threshold`.
    pub pattern_capacity_margin: usize,

    /// Lowest physically valid light reading (V).
    pub light_min_v: f64,

    /// Highest physically valid light reading (V). 3.3V ADC reference.
    pub light_max_v: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            light_threshold_v: 0.495627,
            smoothing_window: 3,
            transition_threshold: 3,
            pattern_window_ms: 2000,
            debounce_ms: 50,
            consecutive_alerts: 2,
            sample_period_ms: 50,
            sensor_fault_critical: 10,
            pattern_capacity_margin: 4,
            light_min_v: 0.0,
            light_max_v: 3.3,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a TOML file. Missing keys take defaults.
    ///
    /// # Errors
    /// - `ConfigLoadError::Read` if the file cannot be read
    /// - `ConfigLoadError::Parse` if the TOML is malformed
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// Apply `TAMPER_*` environment variable overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `TAMPER_LIGHT_THRESHOLD_V` | `light_threshold_v` |
    /// | `TAMPER_SMOOTHING_WINDOW` | `smoothing_window` |
    /// | `TAMPER_TRANSITION_THRESHOLD` | `transition_threshold` |
    /// | `TAMPER_PATTERN_WINDOW_MS` | `pattern_window_ms` |
    /// | `TAMPER_DEBOUNCE_MS` | `debounce_ms` |
    /// | `TAMPER_CONSECUTIVE_ALERTS` | `consecutive_alerts` |
    /// | `TAMPER_SAMPLE_PERIOD_MS` | `sample_period_ms` |
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        override_from_env("TAMPER_LIGHT_THRESHOLD_V", &mut self.light_threshold_v);
        override_from_env("TAMPER_SMOOTHING_WINDOW", &mut self.smoothing_window);
        override_from_env("TAMPER_TRANSITION_THRESHOLD", &mut self.transition_threshold);
        override_from_env("TAMPER_PATTERN_WINDOW_MS", &mut self.pattern_window_ms);
        override_from_env("TAMPER_DEBOUNCE_MS", &mut self.debounce_ms);
        override_from_env("TAMPER_CONSECUTIVE_ALERTS", &mut self.consecutive_alerts);
        override_from_env("TAMPER_SAMPLE_PERIOD_MS", &mut self.sample_period_ms);
        self
    }

    /// Take the light threshold from a calibration artifact.
    #[must_use]
    pub fn with_calibration(mut self, calibration: &CalibrationArtifact) -> Self {
        self.light_threshold_v = calibration.light_threshold_v;
        self
    }

    /// Check every field, returning the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |msg: String| Err(ConfigLoadError::Invalid(msg));

        if !self.light_min_v.is_finite()
            || !self.light_max_v.is_finite()
            || self.light_min_v >= self.light_max_v
        {
            return invalid(format!(
                "light range [{}, {}] is empty",
                self.light_min_v, self.light_max_v
            ));
        }
        if !self.light_threshold_v.is_finite()
            || self.light_threshold_v < self.light_min_v
            || self.light_threshold_v > self.light_max_v
        {
            return invalid(format!(
                "light_threshold_v {} outside [{}, {}]",
                self.light_threshold_v, self.light_min_v, self.light_max_v
            ));
        }
        if self.smoothing_window == 0 || self.smoothing_window > MAX_BUFFER_LEN {
            return invalid(format!(
                "smoothing_window {} outside 1..={}",
                self.smoothing_window, MAX_BUFFER_LEN
            ));
        }
        if self.transition_threshold == 0 {
            return invalid("transition_threshold must be > 0".into());
        }
        if self.pattern_capacity() > MAX_BUFFER_LEN {
            return invalid(format!(
                "transition_threshold + pattern_capacity_margin ({} + {}) exceeds {}",
                self.transition_threshold, self.pattern_capacity_margin, MAX_BUFFER_LEN
            ));
        }
        if self.pattern_window_ms == 0 {
            return invalid("pattern_window_ms must be > 0".into());
        }
        if self.debounce_ms >= self.pattern_window_ms {
            return invalid(format!(
                "debounce_ms {} must be shorter than pattern_window_ms {}",
                self.debounce_ms, self.pattern_window_ms
            ));
        }
        if self.consecutive_alerts == 0 {
            return invalid("consecutive_alerts must be > 0".into());
        }
        if self.sample_period_ms == 0 {
            return invalid("sample_period_ms must be > 0".into());
        }
        if self.sensor_fault_critical == 0 {
            return invalid("sensor_fault_critical must be > 0".into());
        }
        Ok(())
    }

    /// Upper bound on retained transition timestamps.
    pub fn pattern_capacity(&self) -> usize {
        self.transition_threshold
            .saturating_add(self.pattern_capacity_margin)
    }
}

fn override_from_env<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = env::var(key) {
        if let Ok(value) = raw.trim().parse::<T>() {
            *slot = value;
        }
    }
}

/// Output of the offline threshold calibration.
///
/// The calibration run writes `NAME = value` lines with `#` comments:
///
/// ```text
/// # Threshold value (in Volts)
/// LIGHT_THRESHOLD = 0.495627
/// CV_ACCURACY = 0.9919
/// ```
///
/// Only `LIGHT_THRESHOLD` is required. The cross-validation metrics are kept
/// for the startup log.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationArtifact {
    pub light_threshold_v: f64,
    pub cv_accuracy: Option<f64>,
    pub cv_std: Option<f64>,
    pub cv_f1_score: Option<f64>,
    pub cv_precision: Option<f64>,
    pub cv_recall: Option<f64>,
}

impl CalibrationArtifact {
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(text: &str) -> ConfigResult<Self> {
        let mut threshold = None;
        let mut artifact = Self {
            light_threshold_v: 0.0,
            cv_accuracy: None,
            cv_std: None,
            cv_f1_score: None,
            cv_precision: None,
            cv_recall: None,
        };

        for line in text.lines() {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            };
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            let slot = match key {
                "LIGHT_THRESHOLD" => &mut threshold,
                "CV_ACCURACY" => &mut artifact.cv_accuracy,
                "CV_STD" => &mut artifact.cv_std,
                "CV_F1_SCORE" => &mut artifact.cv_f1_score,
                "CV_PRECISION" => &mut artifact.cv_precision,
                "CV_RECALL" => &mut artifact.cv_recall,
                _ => continue,
            };
            let parsed = value.parse::<f64>().map_err(|_| ConfigLoadError::BadValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;
            *slot = Some(parsed);
        }

        artifact.light_threshold_v =
            threshold.ok_or_else(|| ConfigLoadError::MissingKey("LIGHT_THRESHOLD".into()))?;
        Ok(artifact)
    }

    /// Emit the calibration summary at info level.
    pub fn log_summary(&self) {
        info!(
            threshold_v = self.light_threshold_v,
            cv_accuracy = ?self.cv_accuracy,
            cv_f1 = ?self.cv_f1_score,
            cv_precision = ?self.cv_precision,
            cv_recall = ?self.cv_recall,
            "loaded light threshold calibration"
        );
    }
}
