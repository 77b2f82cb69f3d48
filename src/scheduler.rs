//! Fixed-rate driver for the detection engine.
//!
//! Runs `tick` once per sample period on the calling thread, sleeping away
//! whatever is left of each period. Ticks that overrun are counted as deadline
//! misses; the loop does not try to catch up, it simply starts the next
//! period immediately.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::engine::DetectionEngine;
use crate::sensor::{AlarmOutput, SensorSource};

/// Timing statistics for the detection loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopMetrics {
    pub total_ticks: u64,
    pub deadline_misses: u64,
    pub worst_case: Duration,
}

pub struct FixedRateLoop<S, A> {
    engine: DetectionEngine<S, A>,
    period: Duration,
    started: Instant,
    metrics: LoopMetrics,
}

impl<S: SensorSource, A: AlarmOutput> FixedRateLoop<S, A> {
    pub fn new(engine: DetectionEngine<S, A>) -> Self {
        let period = Duration::from_millis(engine.config().sample_period_ms);
        Self {
            engine,
            period,
            started: Instant::now(),
            metrics: LoopMetrics::default(),
        }
    }

    /// One period: tick, account, sleep the remainder.
    pub fn step(&mut self) {
        let cycle_start = Instant::now();

        // Kill switch is honored before any sensor I/O
        if !self.engine.control().is_enabled() {
            self.engine.silence();
        }

        let now_ms = self.started.elapsed().as_millis() as u64;
        self.engine.tick(now_ms);

        let elapsed = cycle_start.elapsed();
        self.metrics.total_ticks += 1;
        if elapsed > self.period {
            self.metrics.deadline_misses += 1;
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                "detection tick overran its period"
            );
        }
        if elapsed > self.metrics.worst_case {
            self.metrics.worst_case = elapsed;
        }

        if elapsed < self.period {
            std::thread::sleep(self.period - elapsed);
        }
    }

    /// Run exactly `ticks` periods (replay and tests).
    pub fn run_ticks(&mut self, ticks: u64) -> LoopMetrics {
        for _ in 0..ticks {
            self.step();
        }
        self.log_metrics();
        self.metrics
    }

    /// Run until the process exits.
    pub fn run_forever(&mut self) -> ! {
        info!(
            period_ms = self.period.as_millis() as u64,
            "detection loop started"
        );
        loop {
            self.step();
            if self.metrics.total_ticks % 1200 == 0 {
                self.log_metrics();
            }
        }
    }

    pub fn metrics(&self) -> LoopMetrics {
        self.metrics
    }

    pub fn engine(&self) -> &DetectionEngine<S, A> {
        &self.engine
    }

    fn log_metrics(&self) {
        debug!(
            ticks = self.metrics.total_ticks,
            misses = self.metrics.deadline_misses,
            worst_us = self.metrics.worst_case.as_micros() as u64,
            "detection loop timing"
        );
    }
}
