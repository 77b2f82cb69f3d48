/// Integration tests for the complete detection pipeline.
/// Drive the engine tick by tick with scripted sensor input and check the
/// end-to-end behavior: verdicts, alarm timing, counters and the snapshot.

#[cfg(test)]
mod integration_tests {
    use crate::config::RuntimeConfig;
    use crate::engine::DetectionEngine;
    use crate::error::SensorReadError;
    use crate::sensor::{RecordingAlarm, ReplaySensor, ScriptedSensor};
    use crate::types::*;

    /// Helper: the small config used by the documented scenarios.
    fn scenario_config() -> RuntimeConfig {
        RuntimeConfig {
            light_threshold_v: 0.5,
            smoothing_window: 3,
            debounce_ms: 50,
            pattern_window_ms: 2000,
            transition_threshold: 3,
            consecutive_alerts: 2,
            ..RuntimeConfig::default()
        }
    }

    fn engine(
        config: RuntimeConfig,
        sensor: ScriptedSensor,
    ) -> DetectionEngine<ScriptedSensor, RecordingAlarm> {
        DetectionEngine::new(config, sensor, RecordingAlarm::new()).unwrap()
    }

    /// Helper: one scripted row per (light, tilt) pair.
    fn scripted(rows: &[(f64, bool)]) -> ScriptedSensor {
        let mut sensor = ScriptedSensor::new();
        for &(light, tilt) in rows {
            sensor.push(light, tilt);
        }
        sensor
    }

    #[test]
    fn test_shake_scenario_activates_alarm() {
        // Dark enclosure, tilt toggles at t=0, 0.5s, 1.0s, then one more tick at 1.05s
        let sensor = scripted(&[(0.3, true), (0.3, false), (0.3, true), (0.3, true)]);
        let mut engine = engine(scenario_config(), sensor);

        let v0 = engine.tick(0);
        assert!(!v0.is_anomaly);
        assert_eq!(v0.transition_count, 1);

        let v1 = engine.tick(500);
        assert!(!v1.is_anomaly);
        assert_eq!(v1.transition_count, 2);

        let v2 = engine.tick(1000);
        assert!(v2.is_anomaly, "third transition should complete the pattern");
        assert_eq!(v2.transition_count, 3);
        assert_eq!(v2.reason.to_string(), "Shake");
        assert!((v2.light_value - 0.3).abs() < 1e-9);
        assert!(!engine.alarm_state().is_active());

        let v3 = engine.tick(1050);
        assert!(v3.is_anomaly);
        assert!(engine.alarm_state().is_active());
        assert!(engine.output().level());

        let snap = engine.snapshot();
        assert_eq!(snap.shake_anomalies, 1, "one crossing, one count");
        assert_eq!(snap.light_anomalies, 0);
        assert_eq!(snap.total_transitions, 3);
        assert_eq!(snap.changes_in_window, 3);
        assert!(snap.pattern_active);
        assert!(snap.alarm_active);
    }

    #[test]
    fn test_single_bright_reading_scenario() {
        let sensor = scripted(&[(0.6, false), (0.6, false)]);
        let mut engine = engine(scenario_config(), sensor);

        let first = engine.tick(0);
        assert!(first.is_anomaly);
        assert!(first.reason.contains(AnomalyReason::Light));
        assert!(!first.reason.contains(AnomalyReason::Shake));
        assert!(!engine.snapshot().alarm_active);

        engine.tick(50);
        assert!(engine.snapshot().alarm_active, "active on exactly the second tick");
    }

    #[test]
    fn test_alarm_clears_immediately_when_dark_again() {
        // Smoothing window 1 so the light drop is seen immediately
        let config = RuntimeConfig {
            smoothing_window: 1,
            ..scenario_config()
        };
        let sensor = scripted(&[(0.9, false), (0.9, false), (0.1, false)]);
        let mut engine = engine(config, sensor);

        engine.tick(0);
        engine.tick(50);
        assert!(engine.alarm_state().is_active());

        engine.tick(100);
        assert!(!engine.alarm_state().is_active());
        assert_eq!(engine.output().driven, vec![false, true, false]);
    }

    #[test]
    fn test_smoothing_delays_light_anomaly() {
        // Window 3: 0.25, 0.25, 1.0 -> mean 0.5 (not > 0.5), then 0.25, 1.0, 1.0 -> 0.75
        let sensor = scripted(&[(0.25, false), (0.25, false), (1.0, false), (1.0, false)]);
        let mut engine = engine(scenario_config(), sensor);

        assert!(!engine.tick(0).is_anomaly);
        assert!(!engine.tick(50).is_anomaly);
        let v = engine.tick(100);
        assert!((v.light_value - 0.5).abs() < 1e-9);
        assert!(!v.is_anomaly, "equality with the threshold is normal");
        assert!(engine.tick(150).is_anomaly);
    }

    #[test]
    fn test_kill_switch_silences_within_same_tick() {
        let sensor = scripted(&[(0.9, false)]);
        let mut engine = engine(scenario_config(), sensor);
        let control = engine.control();

        engine.tick(0);
        engine.tick(50);
        assert!(engine.output().level());

        control.set_enabled(false);
        engine.tick(100);
        let snap = engine.snapshot();
        assert!(!snap.alarm_active);
        assert!(!snap.system_active);
        assert!(!engine.output().level());
        assert_eq!(snap.consecutive_anomalies, 0);

        // Re-enabling starts the hysteresis count from scratch
        control.set_enabled(true);
        engine.tick(150);
        assert!(!engine.snapshot().alarm_active);
        engine.tick(200);
        assert!(engine.snapshot().alarm_active);
    }

    #[test]
    fn test_disabled_ticks_keep_debounce_coherent() {
        let sensor = scripted(&[(0.2, true), (0.2, false), (0.2, true)]);
        let mut engine = engine(scenario_config(), sensor);
        let control = engine.control();
        control.set_enabled(false);

        engine.tick(0);
        engine.tick(300);
        engine.tick(600);

        let snap = engine.snapshot();
        // Transitions and window still tracked while disabled
        assert_eq!(snap.total_transitions, 3);
        assert_eq!(snap.changes_in_window, 3);
        // But no anomaly counters and no alarm
        assert_eq!(snap.shake_anomalies, 0);
        assert!(!snap.alarm_active);
    }

    #[test]
    fn test_bounce_collapses_into_one_transition() {
        // Chatter every 10ms for 40ms after the first edge
        let sensor = scripted(&[
            (0.2, true),
            (0.2, false),
            (0.2, true),
            (0.2, false),
            (0.2, true),
        ]);
        let mut engine = engine(scenario_config(), sensor);
        for t in [0, 10, 20, 30, 40] {
            engine.tick(t);
        }
        assert_eq!(engine.snapshot().total_transitions, 1);
        assert_eq!(engine.snapshot().changes_in_window, 1);
    }

    #[test]
    fn test_pattern_expires_after_window() {
        let sensor = scripted(&[(0.2, true), (0.2, false), (0.2, true), (0.2, true)]);
        let mut engine = engine(scenario_config(), sensor);

        engine.tick(0);
        engine.tick(500);
        assert!(engine.tick(1000).is_anomaly);
        // Oldest edge (t=0) still inside at exactly 2000ms
        assert!(engine.tick(2000).is_anomaly);
        // And aged out just after
        let v = engine.tick(2001);
        assert!(!v.is_anomaly);
        assert_eq!(v.transition_count, 2);
    }

    #[test]
    fn test_light_and_shake_together() {
        let sensor = scripted(&[(0.9, true), (0.9, false), (0.9, true)]);
        let mut engine = engine(scenario_config(), sensor);
        engine.tick(0);
        engine.tick(200);
        let v = engine.tick(400);
        assert_eq!(v.reason.to_string(), "Light + Shake");
        assert_eq!(engine.snapshot().reason_text, "Light + Shake");
        assert_eq!(engine.snapshot().light_anomalies, 3);
    }

    #[test]
    fn test_sustained_sensor_failure_reaches_critical_then_recovers() {
        let config = RuntimeConfig {
            sensor_fault_critical: 3,
            ..scenario_config()
        };
        let mut sensor = ScriptedSensor::new();
        sensor.push(0.2, false);
        for _ in 0..3 {
            sensor.push_light_error(SensorReadError::Io("adc timeout".into()), false);
        }
        sensor.push(0.2, false);
        let mut engine = engine(config, sensor);

        engine.tick(0);
        engine.tick(50);
        assert_eq!(engine.snapshot().health, SensorHealth::Degraded);
        engine.tick(100);
        engine.tick(150);
        let snap = engine.snapshot();
        assert_eq!(snap.health, SensorHealth::Critical);
        assert_eq!(snap.consecutive_sensor_failures, 3);
        // Alarm logic never saw the failure
        assert!(!snap.alarm_active);
        assert!((snap.light_v - 0.2).abs() < 1e-9);

        engine.tick(200);
        let snap = engine.snapshot();
        assert_eq!(snap.health, SensorHealth::Nominal);
        assert_eq!(snap.sensor_faults, 3);
    }

    #[test]
    fn test_sensor_fault_does_not_break_hysteresis() {
        let mut sensor = ScriptedSensor::new();
        sensor
            .push(0.9, false)
            .push_light_error(SensorReadError::NotFinite, false)
            .push(0.9, false);
        let mut engine = engine(scenario_config(), sensor);

        engine.tick(0);
        // Failed read substitutes the previous smoothed value (0.9): still anomalous
        engine.tick(50);
        assert!(engine.alarm_state().is_active());
    }

    #[test]
    fn test_snapshot_counts_every_tick() {
        let mut engine = engine(scenario_config(), ScriptedSensor::new());
        for t in 0..25 {
            engine.tick(t * 50);
        }
        let snap = engine.snapshot();
        assert_eq!(snap.total_samples, 25);
        assert_eq!(snap.timestamp_ms, 24 * 50);
    }

    #[test]
    fn test_replay_trace_through_engine() {
        let trace = "\
light,vibration,label
0.21,0,normal
0.22,0,normal
1.40,0,anomaly
1.45,0,anomaly
1.50,0,anomaly
";
        let sensor = ReplaySensor::from_csv_str(trace, false).unwrap();
        let mut engine = DetectionEngine::new(
            RuntimeConfig::default(),
            sensor,
            RecordingAlarm::new(),
        )
        .unwrap();

        for i in 0..5 {
            engine.tick(i * 50);
        }
        assert!(engine.snapshot().alarm_active);

        // Trace exhausted: reads fail, last smoothed value holds
        engine.tick(250);
        let snap = engine.snapshot();
        assert_eq!(snap.sensor_faults, 2, "light and tilt both exhausted");
        assert!(snap.alarm_active);
    }
}
