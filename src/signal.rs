//! Light signal smoothing.
//!
//! The photocell is noisy at the ADC level; a short trailing moving average
//! keeps single-sample spikes from reaching the threshold test. The window is
//! small (3 samples by default) so the mean is recomputed from the buffer on
//! every update rather than tracked incrementally, which keeps the result
//! exactly equal to the mean of the retained readings.

use std::collections::VecDeque;

/// Readings reserved up front; larger windows grow on demand.
const PREALLOCATE_MAX: usize = 64;

/// Bounded moving-average filter over raw light readings (V).
#[derive(Debug, Clone)]
pub struct SignalSmoother {
    /// Most recent readings, oldest at the front. Never longer than `window`.
    history: VecDeque<f64>,
    window: usize,
    /// Last value returned by `update`, reused when a read fails.
    last_smoothed: f64,
}

impl SignalSmoother {
    /// Create a smoother averaging the last `window` readings.
    ///
    /// A zero window is treated as 1 (no smoothing).
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            history: VecDeque::with_capacity(window.min(PREALLOCATE_MAX)),
            window,
            last_smoothed: 0.0,
        }
    }

    /// Push a raw reading and return the mean of the retained history.
    pub fn update(&mut self, raw: f64) -> f64 {
        self.history.push_back(raw);
        while self.history.len() > self.window {
            self.history.pop_front();
        }

        let sum: f64 = self.history.iter().sum();
        self.last_smoothed = sum / self.history.len() as f64;
        self.last_smoothed
    }

    /// Last smoothed value, or 0.0 before the first reading.
    pub fn last(&self) -> f64 {
        self.last_smoothed
    }

    /// Number of readings currently averaged.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
