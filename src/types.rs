//! Core data types for the detection core.
//!
//! Every value that crosses a stage boundary gets a type here. Verdicts and
//! snapshots are built fresh each tick and never mutated afterwards.

use std::fmt;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

/// Why a tick was judged anomalous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnomalyReason {
    /// Smoothed light exceeded the calibrated threshold (enclosure opened).
    Light,
    /// Tilt transitions inside the pattern window reached the threshold.
    Shake,
}

impl AnomalyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyReason::Light => "Light",
            AnomalyReason::Shake => "Shake",
        }
    }
}

/// Set of [`AnomalyReason`]s. Both may be present at once.
///
/// Serializes as a list (`["Light", "Shake"]`) and displays as
/// `"Light + Shake"`, or `"Normal"` when empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReasonSet {
    light: bool,
    shake: bool,
}

impl ReasonSet {
    pub fn new(light: bool, shake: bool) -> Self {
        Self { light, shake }
    }

    pub fn contains(&self, reason: AnomalyReason) -> bool {
        match reason {
            AnomalyReason::Light => self.light,
            AnomalyReason::Shake => self.shake,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.light && !self.shake
    }

    pub fn len(&self) -> usize {
        self.light as usize + self.shake as usize
    }

    /// Reasons in fixed order: Light before Shake.
    pub fn iter(&self) -> impl Iterator<Item = AnomalyReason> {
        [
            (self.light, AnomalyReason::Light),
            (self.shake, AnomalyReason::Shake),
        ]
        .into_iter()
        .filter_map(|(set, reason)| set.then_some(reason))
    }
}

impl fmt::Display for ReasonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Normal");
        }
        for (i, reason) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            f.write_str(reason.as_str())?;
        }
        Ok(())
    }
}

impl Serialize for ReasonSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for reason in self.iter() {
            seq.serialize_element(&reason)?;
        }
        seq.end()
    }
}

/// Outcome of classifying one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,
    pub reason: ReasonSet,
    /// Smoothed light value the verdict was based on (V).
    pub light_value: f64,
    /// Tilt transitions inside the pattern window at classification time.
    pub transition_count: usize,
}

/// Alarm output level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AlarmPhase {
    /// Buzzer off.
    #[default]
    Idle,
    /// Buzzer on.
    Active,
}

/// Hysteresis state owned by the alarm controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AlarmState {
    pub consecutive_anomaly_count: u32,
    pub phase: AlarmPhase,
}

impl AlarmState {
    pub fn is_active(&self) -> bool {
        self.phase == AlarmPhase::Active
    }
}

/// Health of the sensor read path, derived from consecutive read failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SensorHealth {
    /// Last read succeeded.
    #[default]
    Nominal,
    /// Recent reads failing; substituted values in use.
    Degraded,
    /// Sustained failure. Readings are stale.
    Critical,
}

impl SensorHealth {
    pub fn from_consecutive_failures(failures: u32, critical_at: u32) -> Self {
        match failures {
            0 => SensorHealth::Nominal,
            n if n >= critical_at => SensorHealth::Critical,
            _ => SensorHealth::Degraded,
        }
    }
}

/// Read-only projection of the whole core, published once per tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSnapshot {
    /// Engine timestamp of the tick that produced this snapshot (ms).
    pub timestamp_ms: u64,
    /// Smoothed light value (V).
    pub light_v: f64,
    /// Last tilt level used (raw, or substituted on read failure).
    pub tilt: bool,
    pub is_anomaly: bool,
    pub reason: ReasonSet,
    /// `reason` rendered for humans: "Normal", "Light", "Shake", "Light + Shake".
    pub reason_text: String,
    pub changes_in_window: usize,
    pub pattern_active: bool,
    pub system_active: bool,
    pub alarm_active: bool,
    pub consecutive_anomalies: u32,
    pub total_samples: u64,
    pub light_anomalies: u64,
    pub shake_anomalies: u64,
    pub total_transitions: u64,
    pub sensor_faults: u64,
    pub consecutive_sensor_failures: u32,
    pub health: SensorHealth,
}

impl SystemSnapshot {
    /// Snapshot published before the first tick.
    pub fn initial(system_active: bool) -> Self {
        Self {
            timestamp_ms: 0,
            light_v: 0.0,
            tilt: false,
            is_anomaly: false,
            reason: ReasonSet::default(),
            reason_text: ReasonSet::default().to_string(),
            changes_in_window: 0,
            pattern_active: false,
            system_active,
            alarm_active: false,
            consecutive_anomalies: 0,
            total_samples: 0,
            light_anomalies: 0,
            shake_anomalies: 0,
            total_transitions: 0,
            sensor_faults: 0,
            consecutive_sensor_failures: 0,
            health: SensorHealth::Nominal,
        }
    }
}
