//! Tamper Sense
//!
//! Runs the detection loop on a dedicated thread and the control server on
//! the main thread. Configuration errors exit with code 1 before any
//! detection starts.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use tamper_sense::control::ControlServer;
use tamper_sense::scheduler::FixedRateLoop;
use tamper_sense::sensor::{LogAlarm, QuietSensor, ReplaySensor, SensorSource};
use tamper_sense::{CalibrationArtifact, ConfigLoadError, ControlHandle, DetectionEngine, RuntimeConfig};

#[derive(Parser)]
#[command(name = "tamper-sense")]
#[command(version)]
#[command(about = "Light + tilt intrusion detector with remote kill switch")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Calibration artifact supplying LIGHT_THRESHOLD
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Replay a recorded light,vibration CSV trace instead of live sensors
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Stop after this many ticks (default: run forever)
    #[arg(long)]
    ticks: Option<u64>,

    /// Control server address
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "refusing to start detection");
            return ExitCode::FAILURE;
        }
    };

    let sensor: Box<dyn SensorSource + Send> = match &cli.replay {
        Some(path) => match ReplaySensor::from_file(path, cli.ticks.is_none()) {
            Ok(replay) => Box::new(replay),
            Err(e) => {
                error!(error = %e, "cannot open replay trace");
                return ExitCode::FAILURE;
            }
        },
        None => {
            info!("no sensor trace given, using quiet simulated sensor");
            Box::new(QuietSensor::default())
        }
    };

    let control = ControlHandle::new(true);
    let engine = match DetectionEngine::with_control(
        config,
        sensor,
        LogAlarm::default(),
        control.clone(),
    ) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "refusing to start detection");
            return ExitCode::FAILURE;
        }
    };

    let mut runner = FixedRateLoop::new(engine);
    let detection = match cli.ticks {
        Some(ticks) => thread::spawn(move || {
            let metrics = runner.run_ticks(ticks);
            info!(
                ticks = metrics.total_ticks,
                misses = metrics.deadline_misses,
                "bounded run complete"
            );
        }),
        None => thread::spawn(move || {
            runner.run_forever();
        }),
    };

    let server = match ControlServer::bind(cli.listen.as_str(), control.clone()) {
        Ok(server) => server,
        Err(e) => {
            // Detection still runs without a control channel
            error!(addr = %cli.listen, error = %e, "control server unavailable");
            if !detection_finished(detection.join()) {
                return ExitCode::FAILURE;
            }
            return ExitCode::SUCCESS;
        }
    };

    if cli.ticks.is_some() {
        thread::spawn(move || server.serve_forever());
        if !detection_finished(detection.join()) {
            return ExitCode::FAILURE;
        }
        let snapshot = control.get_snapshot();
        match serde_json::to_string_pretty(&*snapshot) {
            Ok(json) => println!("{json}"),
            Err(e) => error!(error = %e, "failed to render final snapshot"),
        }
        return ExitCode::SUCCESS;
    }

    server.serve_forever()
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig, ConfigLoadError> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    }
    .with_env_overrides();

    if let Some(path) = &cli.calibration {
        let calibration = CalibrationArtifact::from_file(path)?;
        calibration.log_summary();
        config = config.with_calibration(&calibration);
    }

    config.validate()?;
    info!(
        threshold_v = config.light_threshold_v,
        shake = %format!(
            "{} changes in {}ms",
            config.transition_threshold, config.pattern_window_ms
        ),
        period_ms = config.sample_period_ms,
        "configuration loaded"
    );
    Ok(config)
}

/// True if the detection thread ran to completion. A panic is logged.
fn detection_finished(result: thread::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(panic = %message, "detection thread panicked");
            false
        }
    }
}
