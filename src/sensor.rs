//! Sensor and alarm-output collaborators.
//!
//! The detection core never touches hardware directly. It reads through a
//! [`SensorSource`] and drives the buzzer through an [`AlarmOutput`]. The ADC
//! and GPIO bindings of a particular board implement these traits outside the
//! core; this module ships the sources used for replay, simulation and tests.
//!
//! Read order per tick is `read_light` then `read_tilt`. Row-based sources
//! advance on `read_light`.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{OutputDriveError, SensorReadError};

/// Raw sensor access. Must return within one sample period.
pub trait SensorSource {
    /// Photocell voltage, nominally 0.0..=3.3.
    fn read_light(&mut self) -> Result<f64, SensorReadError>;

    /// Tilt switch level.
    fn read_tilt(&mut self) -> Result<bool, SensorReadError>;
}

/// Physical buzzer. Driving the same level twice must be harmless.
pub trait AlarmOutput {
    fn set_alarm(&mut self, on: bool) -> Result<(), OutputDriveError>;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn read_light(&mut self) -> Result<f64, SensorReadError> {
        (**self).read_light()
    }

    fn read_tilt(&mut self) -> Result<bool, SensorReadError> {
        (**self).read_tilt()
    }
}

impl<A: AlarmOutput + ?Sized> AlarmOutput for Box<A> {
    fn set_alarm(&mut self, on: bool) -> Result<(), OutputDriveError> {
        (**self).set_alarm(on)
    }
}

// ============================================================================
// REPLAY
// ============================================================================

/// One recorded sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceRow {
    pub light_v: f64,
    pub tilt: bool,
}

/// Replays a trace recorded by the on-board collection script.
///
/// Format: CSV with an optional `light,vibration,label` header. The third
/// column (label) is ignored. Vibration accepts `0`/`1` or `true`/`false`.
///
/// ```text
/// light,vibration,label
/// 0.2113,0,normal
/// 0.8731,1,anomaly
/// ```
#[derive(Debug, Clone)]
pub struct ReplaySensor {
    rows: Vec<TraceRow>,
    /// Index of the row returned by the last `read_light`.
    cursor: Option<usize>,
    looping: bool,
}

impl ReplaySensor {
    /// A finite replay reports `Exhausted` after the last row; a looping one
    /// wraps to the first.
    pub fn new(rows: Vec<TraceRow>, looping: bool) -> Self {
        Self {
            rows,
            cursor: None,
            looping,
        }
    }

    pub fn from_file(path: impl AsRef<Path>, looping: bool) -> Result<Self, SensorReadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SensorReadError::Io(format!("failed to read trace '{}': {}", path.display(), e))
        })?;
        let sensor = Self::from_csv_str(&text, looping)?;
        info!(path = %path.display(), rows = sensor.len(), "loaded replay trace");
        Ok(sensor)
    }

    pub fn from_csv_str(text: &str, looping: bool) -> Result<Self, SensorReadError> {
        let mut rows = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split(',').map(str::trim);
            let light = fields.next().unwrap_or_default();
            let tilt = fields.next().unwrap_or("0");

            let light_v = match light.parse::<f64>() {
                Ok(v) => v,
                // Header row
                Err(_) if rows.is_empty() && light.eq_ignore_ascii_case("light") => continue,
                Err(_) => {
                    return Err(SensorReadError::Io(format!(
                        "line {}: bad light value '{}'",
                        line_no + 1,
                        light
                    )))
                }
            };
            let tilt = match tilt {
                "1" | "true" | "True" => true,
                "0" | "false" | "False" => false,
                other => {
                    return Err(SensorReadError::Io(format!(
                        "line {}: bad vibration value '{}'",
                        line_no + 1,
                        other
                    )))
                }
            };
            rows.push(TraceRow { light_v, tilt });
        }

        Ok(Self::new(rows, looping))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn current(&self) -> Result<TraceRow, SensorReadError> {
        self.cursor
            .and_then(|i| self.rows.get(i).copied())
            .ok_or(SensorReadError::Exhausted)
    }
}

impl SensorSource for ReplaySensor {
    fn read_light(&mut self) -> Result<f64, SensorReadError> {
        let next = self.cursor.map_or(0, |i| i + 1);
        self.cursor = if next < self.rows.len() {
            Some(next)
        } else if self.looping && !self.rows.is_empty() {
            Some(0)
        } else {
            // Park past the end so read_tilt also reports exhaustion
            Some(self.rows.len())
        };
        self.current().map(|row| row.light_v)
    }

    fn read_tilt(&mut self) -> Result<bool, SensorReadError> {
        self.current().map(|row| row.tilt)
    }
}

// ============================================================================
// SIMULATION
// ============================================================================

/// Quiet enclosure: dark, switch at rest. Used when no hardware or trace is
/// attached.
#[derive(Debug, Clone, Copy)]
pub struct QuietSensor {
    pub light_v: f64,
}

impl Default for QuietSensor {
    fn default() -> Self {
        Self { light_v: 0.2 }
    }
}

impl SensorSource for QuietSensor {
    fn read_light(&mut self) -> Result<f64, SensorReadError> {
        Ok(self.light_v)
    }

    fn read_tilt(&mut self) -> Result<bool, SensorReadError> {
        Ok(false)
    }
}

/// Queue-driven source for tests and demos.
///
/// Each read pops the next scripted result. Once a queue is empty the last
/// successful value is held.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    lights: VecDeque<Result<f64, SensorReadError>>,
    tilts: VecDeque<Result<bool, SensorReadError>>,
    held_light: f64,
    held_tilt: bool,
    light_delay: Option<Duration>,
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, light_v: f64, tilt: bool) -> &mut Self {
        self.lights.push_back(Ok(light_v));
        self.tilts.push_back(Ok(tilt));
        self
    }

    pub fn push_light_error(&mut self, err: SensorReadError, tilt: bool) -> &mut Self {
        self.lights.push_back(Err(err));
        self.tilts.push_back(Ok(tilt));
        self
    }

    pub fn push_tilt_error(&mut self, light_v: f64, err: SensorReadError) -> &mut Self {
        self.lights.push_back(Ok(light_v));
        self.tilts.push_back(Err(err));
        self
    }

    /// Every `read_light` sleeps this long first (slow ADC simulation).
    pub fn with_light_delay(mut self, delay: Duration) -> Self {
        self.light_delay = Some(delay);
        self
    }
}

impl SensorSource for ScriptedSensor {
    fn read_light(&mut self) -> Result<f64, SensorReadError> {
        if let Some(delay) = self.light_delay {
            std::thread::sleep(delay);
        }
        match self.lights.pop_front() {
            Some(Ok(v)) => {
                self.held_light = v;
                Ok(v)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.held_light),
        }
    }

    fn read_tilt(&mut self) -> Result<bool, SensorReadError> {
        match self.tilts.pop_front() {
            Some(Ok(v)) => {
                self.held_tilt = v;
                Ok(v)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.held_tilt),
        }
    }
}

// ============================================================================
// OUTPUTS
// ============================================================================

/// Buzzer stand-in that logs level changes.
#[derive(Debug, Default)]
pub struct LogAlarm {
    on: bool,
}

impl AlarmOutput for LogAlarm {
    fn set_alarm(&mut self, on: bool) -> Result<(), OutputDriveError> {
        if on != self.on {
            info!(buzzer = if on { "on" } else { "off" }, "alarm output");
        }
        self.on = on;
        Ok(())
    }
}

/// Records every drive call. Can be told to fail the next N calls.
#[derive(Debug, Default)]
pub struct RecordingAlarm {
    /// Levels successfully driven, in order.
    pub driven: Vec<bool>,
    /// Calls attempted, including failures.
    pub attempts: u32,
    fail_remaining: u32,
}

impl RecordingAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&mut self, calls: u32) {
        self.fail_remaining = calls;
    }

    /// Level currently on the wire (false if never driven).
    pub fn level(&self) -> bool {
        self.driven.last().copied().unwrap_or(false)
    }
}

impl AlarmOutput for RecordingAlarm {
    fn set_alarm(&mut self, on: bool) -> Result<(), OutputDriveError> {
        self.attempts += 1;
        if self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            debug!(on, "simulated alarm drive failure");
            return Err(OutputDriveError::Io("simulated PWM fault".into()));
        }
        self.driven.push(on);
        Ok(())
    }
}
