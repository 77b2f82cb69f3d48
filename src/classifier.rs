//! Light + shake fusion into a single anomaly verdict.

use crate::config::RuntimeConfig;
use crate::types::{AnomalyVerdict, ReasonSet};

/// Pure classifier. Holds only the light threshold it was built with.
#[derive(Debug, Clone, Copy)]
pub struct AnomalyClassifier {
    light_threshold_v: f64,
}

impl AnomalyClassifier {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self::with_threshold(config.light_threshold_v)
    }

    pub fn with_threshold(light_threshold_v: f64) -> Self {
        Self { light_threshold_v }
    }

    /// Light is anomalous strictly above the threshold; equality is normal.
    /// The tick is anomalous if either test fires.
    pub fn classify(
        &self,
        smoothed_light: f64,
        pattern_active: bool,
        transition_count: usize,
    ) -> AnomalyVerdict {
        let light = smoothed_light > self.light_threshold_v;
        let reason = ReasonSet::new(light, pattern_active);

        AnomalyVerdict {
            is_anomaly: light || pattern_active,
            reason,
            light_value: smoothed_light,
            transition_count,
        }
    }

    pub fn light_threshold_v(&self) -> f64 {
        self.light_threshold_v
    }
}
