//! Shake pattern detection over a sliding time window.
//!
//! A single tilt edge is normal (a door settles, a truck drives by). Several
//! accepted edges in a short span is a shake. The window keeps the timestamps
//! of accepted edges, prunes those older than `window_ms` on every update, and
//! reports whether the remaining count meets the threshold.
//!
//! Memory is bounded: at most `capacity` timestamps are retained. Once full,
//! the oldest is dropped, which cannot change the verdict as long as
//! `capacity >= threshold`.

use std::collections::VecDeque;

/// Slots reserved up front; larger buffers grow on demand.
const PREALLOCATE_MAX: usize = 64;

/// Result of one [`PatternWindow::observe`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternStatus {
    /// Count is at or above the threshold.
    pub active: bool,
    /// Transitions retained inside the window.
    pub count: usize,
    /// This call moved the window from below threshold to at/above it.
    /// Fires once per crossing, not on every tick spent above threshold.
    pub crossed: bool,
}

/// Sliding-window transition counter.
#[derive(Debug, Clone)]
pub struct PatternWindow {
    window_ms: u64,
    threshold: usize,
    capacity: usize,
    timestamps: VecDeque<u64>,
    was_active: bool,
}

impl PatternWindow {
    /// `capacity` is raised to `threshold` if smaller.
    pub fn new(window_ms: u64, threshold: usize, capacity: usize) -> Self {
        let capacity = capacity.max(threshold).max(1);
        Self {
            window_ms,
            threshold,
            capacity,
            timestamps: VecDeque::with_capacity(capacity.min(PREALLOCATE_MAX)),
            was_active: false,
        }
    }

    /// Record an optional transition at `now_ms`, prune, and evaluate.
    pub fn observe(&mut self, transition: bool, now_ms: u64) -> PatternStatus {
        if transition {
            if self.timestamps.len() == self.capacity {
                self.timestamps.pop_front();
            }
            self.timestamps.push_back(now_ms);
        }

        // Timestamps arrive in order, so expired entries sit at the front
        while let Some(&oldest) = self.timestamps.front() {
            if now_ms.saturating_sub(oldest) > self.window_ms {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        let count = self.timestamps.len();
        let active = count >= self.threshold;
        let crossed = active && !self.was_active;
        self.was_active = active;

        PatternStatus {
            active,
            count,
            crossed,
        }
    }

    /// Transitions currently retained (as of the last `observe`).
    pub fn count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_huge_capacity_does_not_preallocate() {
        let mut window = PatternWindow::new(2000, 3, usize::MAX);
        assert_eq!(window.capacity(), usize::MAX);
        window.observe(true, 0);
        assert_eq!(window.observe(true, 100).count, 2);
    }

    #[test]
    fn test_below_threshold_inactive() {
        let mut window = PatternWindow::new(2000, 3, 7);
        assert!(!window.observe(true, 0).active);
        let status = window.observe(true, 500);
        assert!(!status.active);
        assert_eq!(status.count, 2);
    }

    #[test]
    fn test_threshold_reached_exactly() {
        let mut window = PatternWindow::new(2000, 3, 7);
        window.observe(true, 0);
        window.observe(true, 500);
        let status = window.observe(true, 1000);
        assert!(status.active);
        assert!(status.crossed);
        assert_eq!(status.count, 3);
    }

    #[test]
    fn test_crossing_fires_once_while_above() {
        let mut window = PatternWindow::new(2000, 3, 7);
        window.observe(true, 0);
        window.observe(true, 100);
        assert!(window.observe(true, 200).crossed);

        // Staying at 3 and climbing to 4 are not new crossings
        assert!(!window.observe(false, 250).crossed);
        let status = window.observe(true, 300);
        assert!(status.active);
        assert!(!status.crossed);
        assert_eq!(status.count, 4);
    }

    #[test]
    fn test_crossing_rearms_after_dropping_below() {
        let mut window = PatternWindow::new(1000, 2, 6);
        window.observe(true, 0);
        assert!(window.observe(true, 100).crossed);
        // t=1050: the edge at 0 ages out
        let status = window.observe(false, 1050);
        assert!(!status.active);
        assert_eq!(status.count, 1);
        // New edge brings it back up: a fresh crossing
        assert!(window.observe(true, 1060).crossed);
    }

    #[test]
    fn test_prune_boundary_inclusive() {
        let mut window = PatternWindow::new(2000, 1, 4);
        window.observe(true, 0);
        // now - t == window is retained
        assert_eq!(window.observe(false, 2000).count, 1);
        // now - t > window is pruned
        assert_eq!(window.observe(false, 2001).count, 0);
    }

    #[test]
    fn test_deactivates_when_threshold_th_from_last_ages_out() {
        let mut window = PatternWindow::new(2000, 3, 7);
        for t in [0, 500, 1000] {
            window.observe(true, t);
        }
        // Active until the edge at t=0 is older than the window
        assert!(window.observe(false, 2000).active);
        assert!(!window.observe(false, 2001).active);
    }

    #[test]
    fn test_capacity_bounds_memory() {
        let mut window = PatternWindow::new(10_000, 3, 5);
        for t in 0..100 {
            let status = window.observe(true, t);
            assert!(status.count <= 5);
        }
        assert_eq!(window.count(), 5);
        assert!(window.observe(false, 100).active);
    }

    #[test]
    fn test_capacity_never_below_threshold() {
        let window = PatternWindow::new(2000, 6, 2);
        assert_eq!(window.capacity(), 6);
        assert_eq!(window.threshold(), 6);
    }

    proptest! {
        #[test]
        fn prop_count_matches_unbounded_window(
            window_ms in 1u64..3000,
            threshold in 1usize..6,
            margin in 0usize..5,
            steps in prop::collection::vec((0u64..400, any::<bool>()), 0..200),
        ) {
            let capacity = threshold + margin;
            let mut window = PatternWindow::new(window_ms, threshold, capacity);
            let mut all_edges: Vec<u64> = Vec::new();
            let mut was_active = false;
            let mut now = 0u64;

            for (gap, transition) in steps {
                now += gap;
                if transition {
                    all_edges.push(now);
                }
                let in_window = all_edges.iter().filter(|&&t| now - t <= window_ms).count();

                let status = window.observe(transition, now);
                prop_assert_eq!(status.count, in_window.min(capacity));
                prop_assert_eq!(status.active, in_window >= threshold);
                prop_assert_eq!(status.crossed, status.active && !was_active);
                was_active = status.active;
            }
        }
    }
}
