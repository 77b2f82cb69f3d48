/// Basic usage example: script a break-in, watch the alarm and kill switch
use tamper_sense::sensor::{RecordingAlarm, ScriptedSensor};
use tamper_sense::{DetectionEngine, RuntimeConfig};

fn main() {
    println!("=== Tamper Sense: Basic Example ===\n");

    // Default config: 20Hz, 3-sample smoothing, 3 tilt changes in 2s = shake
    let config = RuntimeConfig::default();
    let period = config.sample_period_ms;

    // Scripted enclosure: quiet, then shaken, then opened
    let mut sensor = ScriptedSensor::new();
    for _ in 0..10 {
        sensor.push(0.21, false); // dark, at rest
    }
    for i in 0..20 {
        sensor.push(0.22, (i / 4) % 2 == 1); // tilt switch toggling every 200ms
    }
    for _ in 0..10 {
        sensor.push(1.35, false); // lid open
    }

    let mut engine = match DetectionEngine::new(config, sensor, RecordingAlarm::new()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return;
        }
    };
    let control = engine.control();

    println!("Processing 40 ticks...\n");
    let mut was_active = false;
    for tick in 0..40u64 {
        let now_ms = tick * period;
        let verdict = engine.tick(now_ms);
        let snap = engine.snapshot();

        if snap.alarm_active != was_active {
            println!(
                "[{:>5}ms] alarm {} (reason: {}, light {:.3}V, {} changes in window)",
                now_ms,
                if snap.alarm_active { "ON " } else { "off" },
                verdict.reason,
                verdict.light_value,
                verdict.transition_count
            );
            was_active = snap.alarm_active;
        }
    }

    // Remote kill switch
    println!("\nKill switch: disable");
    control.set_enabled(false);
    engine.tick(40 * period);
    println!("  alarm active: {}", engine.snapshot().alarm_active);

    println!("\n=== Final snapshot ===");
    match serde_json::to_string_pretty(&*engine.snapshot()) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("snapshot serialization failed: {e}"),
    }

    println!("\nBuzzer drive history: {:?}", engine.output().driven);
}
