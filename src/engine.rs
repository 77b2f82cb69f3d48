/// Detection engine integrating every stage of the anomaly pipeline.
///
/// One `tick` per sample period runs the full data flow:
/// 1. **Read**: light and tilt from the sensor, validated and timed
/// 2. **Smooth**: moving average over the light signal
/// 3. **Debounce**: accept tilt edges outside the bounce interval
/// 4. **Pattern**: count accepted edges in the trailing window
/// 5. **Classify**: fuse light and shake into a verdict
/// 6. **Alarm**: hysteresis, kill switch, buzzer drive
/// 7. **Publish**: replace the shared `SystemSnapshot`
///
/// # Failure behavior
/// - A bad sensor read never stops the loop. The previous smoothed light (or
///   the last tilt level) is substituted and the fault is counted; health in
///   the snapshot reflects consecutive failures.
/// - A failed buzzer drive is logged and retried next tick. The alarm state
///   machine has already transitioned, so state stays consistent.
/// - While the kill switch is off the engine keeps ticking so smoothing and
///   debounce state stay coherent, but the alarm is forced Idle and anomaly
///   counters are skipped.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::alarm::{log_transition, AlarmController, AlarmTransition};
use crate::classifier::AnomalyClassifier;
use crate::config::RuntimeConfig;
use crate::debounce::EdgeDebouncer;
use crate::error::{ConfigResult, SensorReadError};
use crate::pattern::{PatternStatus, PatternWindow};
use crate::sensor::{AlarmOutput, SensorSource};
use crate::signal::SignalSmoother;
use crate::snapshot::ControlHandle;
use crate::types::*;

/// Cumulative counters carried into every snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCounters {
    pub total_samples: u64,
    pub light_anomalies: u64,
    pub shake_anomalies: u64,
    pub total_transitions: u64,
    pub sensor_faults: u64,
    pub output_faults: u64,
}

/// Owns every detection stage and the collaborators it talks to.
pub struct DetectionEngine<S, A> {
    config: RuntimeConfig,
    sensor: S,
    output: A,
    control: ControlHandle,

    // Stages
    smoother: SignalSmoother,
    debouncer: EdgeDebouncer,
    pattern: PatternWindow,
    classifier: AnomalyClassifier,
    alarm: AlarmController,

    // Bookkeeping
    counters: EngineCounters,
    consecutive_sensor_failures: u32,
    /// Level last accepted by the output. None until the first drive.
    driven_level: Option<bool>,
    last_tilt: bool,
}

impl<S: SensorSource, A: AlarmOutput> DetectionEngine<S, A> {
    /// Build an engine with a fresh, enabled control handle.
    ///
    /// # Errors
    /// `ConfigLoadError::Invalid` if the config fails validation.
    pub fn new(config: RuntimeConfig, sensor: S, output: A) -> ConfigResult<Self> {
        Self::with_control(config, sensor, output, ControlHandle::new(true))
    }

    /// Build an engine publishing through an existing control handle.
    pub fn with_control(
        config: RuntimeConfig,
        sensor: S,
        output: A,
        control: ControlHandle,
    ) -> ConfigResult<Self> {
        config.validate()?;

        Ok(Self {
            smoother: SignalSmoother::new(config.smoothing_window),
            // Tilt switch rests low (pull-down)
            debouncer: EdgeDebouncer::new(false, config.debounce_ms),
            pattern: PatternWindow::new(
                config.pattern_window_ms,
                config.transition_threshold,
                config.pattern_capacity(),
            ),
            classifier: AnomalyClassifier::new(&config),
            alarm: AlarmController::new(config.consecutive_alerts),

            config,
            sensor,
            output,
            control,
            counters: EngineCounters::default(),
            consecutive_sensor_failures: 0,
            driven_level: None,
            last_tilt: false,
        })
    }

    /// Run one detection cycle at engine time `now_ms` and publish the result.
    pub fn tick(&mut self, now_ms: u64) -> AnomalyVerdict {
        let system_enabled = self.control.is_enabled();

        // Stage 1-2: light
        let mut tick_failed = false;
        let light_v = match self.read_light() {
            Ok(raw) => self.smoother.update(raw),
            Err(err) => {
                tick_failed = true;
                self.record_sensor_fault("light", &err);
                self.smoother.last()
            }
        };

        // Stage 3: tilt edges
        let tilt = match self.read_tilt() {
            Ok(level) => level,
            Err(err) => {
                tick_failed = true;
                self.record_sensor_fault("tilt", &err);
                self.last_tilt
            }
        };
        self.last_tilt = tilt;
        self.update_health(tick_failed);

        let transition = self.debouncer.observe(tilt, now_ms);
        if transition {
            self.counters.total_transitions += 1;
        }

        // Stage 4: pattern window
        let pattern = self.pattern.observe(transition, now_ms);

        // Stage 5: classification
        let verdict = self.classifier.classify(light_v, pattern.active, pattern.count);

        if system_enabled {
            self.count_anomalies(&verdict, &pattern);
        }

        // Stage 6: alarm
        let change = self.alarm.update(verdict.is_anomaly, system_enabled);
        if change != AlarmTransition::None {
            log_transition(change, &verdict.reason.to_string(), system_enabled);
        }
        self.drive_output();

        // Stage 7: publish
        self.counters.total_samples += 1;
        self.publish(now_ms, &verdict, &pattern, tilt, system_enabled);

        verdict
    }

    /// Kill-switch fast path: silence the alarm without a full evaluation.
    pub fn silence(&mut self) {
        let change = self.alarm.force_idle();
        if change == AlarmTransition::Deactivated {
            log_transition(change, "", false);
        }
        self.drive_output();
    }

    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn snapshot(&self) -> std::sync::Arc<SystemSnapshot> {
        self.control.get_snapshot()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn counters(&self) -> EngineCounters {
        self.counters
    }

    pub fn alarm_state(&self) -> AlarmState {
        self.alarm.state()
    }

    pub fn health(&self) -> SensorHealth {
        SensorHealth::from_consecutive_failures(
            self.consecutive_sensor_failures,
            self.config.sensor_fault_critical,
        )
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn output(&self) -> &A {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut A {
        &mut self.output
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    fn read_light(&mut self) -> Result<f64, SensorReadError> {
        let started = Instant::now();
        let value = self.sensor.read_light()?;
        self.check_read_budget(started)?;

        if !value.is_finite() {
            return Err(SensorReadError::NotFinite);
        }
        if value < self.config.light_min_v || value > self.config.light_max_v {
            return Err(SensorReadError::OutOfRange {
                value,
                min: self.config.light_min_v,
                max: self.config.light_max_v,
            });
        }
        Ok(value)
    }

    fn read_tilt(&mut self) -> Result<bool, SensorReadError> {
        let started = Instant::now();
        let level = self.sensor.read_tilt()?;
        self.check_read_budget(started)?;
        Ok(level)
    }

    /// A read that overran the sample period is discarded for this tick.
    fn check_read_budget(&self, started: Instant) -> Result<(), SensorReadError> {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if elapsed_ms > self.config.sample_period_ms {
            return Err(SensorReadError::Timeout {
                elapsed_ms,
                budget_ms: self.config.sample_period_ms,
            });
        }
        Ok(())
    }

    fn record_sensor_fault(&mut self, channel: &'static str, err: &SensorReadError) {
        self.counters.sensor_faults += 1;
        // First failure of a run is a warning; the rest would flood at 20Hz
        if self.consecutive_sensor_failures == 0 {
            warn!(channel, error = %err, "sensor read failed, substituting last value");
        } else {
            debug!(channel, error = %err, "sensor read failed");
        }
    }

    fn update_health(&mut self, tick_failed: bool) {
        let before = self.health();
        if tick_failed {
            self.consecutive_sensor_failures = self.consecutive_sensor_failures.saturating_add(1);
        } else {
            self.consecutive_sensor_failures = 0;
        }
        let after = self.health();

        if before != after {
            match after {
                SensorHealth::Nominal => info!("sensor reads recovered"),
                SensorHealth::Degraded => {}
                SensorHealth::Critical => warn!(
                    failures = self.consecutive_sensor_failures,
                    "sensor health critical"
                ),
            }
        }
    }

    fn count_anomalies(&mut self, verdict: &AnomalyVerdict, pattern: &PatternStatus) {
        // Light is counted per tick, shake once per threshold crossing
        if verdict.reason.contains(AnomalyReason::Light) {
            self.counters.light_anomalies += 1;
        }
        if pattern.crossed {
            self.counters.shake_anomalies += 1;
            info!(changes = pattern.count, "shake pattern detected");
        }
    }

    /// Push the controller's level to the buzzer if it differs from what was
    /// last driven. A failed drive leaves `driven_level` stale so it is retried.
    fn drive_output(&mut self) {
        let desired = self.alarm.is_active();
        if self.driven_level == Some(desired) {
            return;
        }
        match self.output.set_alarm(desired) {
            Ok(()) => self.driven_level = Some(desired),
            Err(err) => {
                self.counters.output_faults += 1;
                warn!(on = desired, error = %err, "failed to drive alarm output");
            }
        }
    }

    fn publish(
        &self,
        now_ms: u64,
        verdict: &AnomalyVerdict,
        pattern: &PatternStatus,
        tilt: bool,
        system_enabled: bool,
    ) {
        let alarm = self.alarm.state();
        self.control.publish(SystemSnapshot {
            timestamp_ms: now_ms,
            light_v: verdict.light_value,
            tilt,
            is_anomaly: verdict.is_anomaly,
            reason: verdict.reason,
            reason_text: verdict.reason.to_string(),
            changes_in_window: pattern.count,
            pattern_active: pattern.active,
            system_active: system_enabled,
            alarm_active: alarm.is_active(),
            consecutive_anomalies: alarm.consecutive_anomaly_count,
            total_samples: self.counters.total_samples,
            light_anomalies: self.counters.light_anomalies,
            shake_anomalies: self.counters.shake_anomalies,
            total_transitions: self.counters.total_transitions,
            sensor_faults: self.counters.sensor_faults,
            consecutive_sensor_failures: self.consecutive_sensor_failures,
            health: self.health(),
        });
    }
}
