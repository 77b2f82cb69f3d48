//! Tilt switch edge detection with debounce.
//!
//! A ball-type tilt switch chatters for a few milliseconds every time it
//! changes state. An edge is accepted only when the level differs from the
//! last observed level and more than `debounce_ms` has passed since the last
//! *accepted* edge. Rejected edges still update the observed level but do not
//! move the clock, so chatter inside the interval is absorbed.

/// Debounced edge detector for a binary input.
#[derive(Debug, Clone)]
pub struct EdgeDebouncer {
    debounce_ms: u64,
    last_state: bool,
    /// None until the first edge is accepted.
    last_accepted_ms: Option<u64>,
    accepted: u64,
    rejected: u64,
}

impl EdgeDebouncer {
    /// `initial_state` is the resting level of the switch (false with a pull-down).
    pub fn new(initial_state: bool, debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            last_state: initial_state,
            last_accepted_ms: None,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Observe a raw level at `now_ms`. Returns true iff an edge was accepted.
    pub fn observe(&mut self, raw: bool, now_ms: u64) -> bool {
        if raw == self.last_state {
            return false;
        }
        self.last_state = raw;

        let clear = match self.last_accepted_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) > self.debounce_ms,
        };

        if clear {
            self.last_accepted_ms = Some(now_ms);
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
        clear
    }

    pub fn last_state(&self) -> bool {
        self.last_state
    }

    pub fn last_accepted_ms(&self) -> Option<u64> {
        self.last_accepted_ms
    }

    /// Edges accepted since creation.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Edges absorbed as bounce since creation.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_steady_level_never_transitions() {
        let mut debouncer = EdgeDebouncer::new(false, 50);
        for t in (0..1000).step_by(50) {
            assert!(!debouncer.observe(false, t));
        }
        assert_eq!(debouncer.accepted(), 0);
        assert_eq!(debouncer.last_accepted_ms(), None);
    }

    #[test]
    fn test_first_edge_accepted_at_time_zero() {
        let mut debouncer = EdgeDebouncer::new(false, 50);
        assert!(debouncer.observe(true, 0));
        assert_eq!(debouncer.last_accepted_ms(), Some(0));
        assert!(debouncer.last_state());
    }

    #[test]
    fn test_bounce_within_interval_collapses() {
        let mut debouncer = EdgeDebouncer::new(false, 50);
        assert!(debouncer.observe(true, 100));
        // Chatter 10ms and 30ms later is absorbed
        assert!(!debouncer.observe(false, 110));
        assert!(!debouncer.observe(true, 130));
        assert_eq!(debouncer.accepted(), 1);
        assert_eq!(debouncer.rejected(), 2);
        // Clock was not reset by the rejected edges
        assert_eq!(debouncer.last_accepted_ms(), Some(100));
    }

    #[test]
    fn test_rejected_edge_updates_level() {
        let mut debouncer = EdgeDebouncer::new(false, 50);
        assert!(debouncer.observe(true, 100));
        assert!(!debouncer.observe(false, 120));
        assert!(!debouncer.last_state());
        // Level already false; holding it is not an edge even once clear
        assert!(!debouncer.observe(false, 400));
        // Next real change is accepted
        assert!(debouncer.observe(true, 450));
    }

    #[test]
    fn test_interval_boundary_is_strict() {
        let mut debouncer = EdgeDebouncer::new(false, 50);
        assert!(debouncer.observe(true, 1000));
        // Exactly 50ms later: not strictly greater, rejected
        assert!(!debouncer.observe(false, 1050));
        assert!(debouncer.observe(true, 1101));
    }

    #[test]
    fn test_spaced_edges_all_accepted() {
        let mut debouncer = EdgeDebouncer::new(false, 50);
        let mut level = false;
        for t in [0, 500, 1000, 1500] {
            level = !level;
            assert!(debouncer.observe(level, t));
        }
        assert_eq!(debouncer.accepted(), 4);
    }

    /// A debounce interval plus chatter offsets that all land inside it.
    fn chatter_strategy() -> impl Strategy<Value = (u64, Vec<(u64, bool)>)> {
        (1u64..500).prop_flat_map(|debounce_ms| {
            (
                Just(debounce_ms),
                prop::collection::vec((0..=debounce_ms, any::<bool>()), 0..40),
            )
        })
    }

    proptest! {
        #[test]
        fn prop_bounce_inside_interval_collapses_to_one_edge(
            (debounce_ms, mut chatter) in chatter_strategy(),
            start in 0u64..1_000_000,
        ) {
            chatter.sort_by_key(|&(offset, _)| offset);
            let mut debouncer = EdgeDebouncer::new(false, debounce_ms);
            prop_assert!(debouncer.observe(true, start));

            for (offset, level) in chatter {
                prop_assert!(!debouncer.observe(level, start + offset));
            }
            prop_assert_eq!(debouncer.accepted(), 1);
            prop_assert_eq!(debouncer.last_accepted_ms(), Some(start));
        }

        #[test]
        fn prop_accepted_edges_are_spaced_and_real(
            debounce_ms in 0u64..300,
            steps in prop::collection::vec((0u64..200, any::<bool>()), 0..200),
        ) {
            let mut debouncer = EdgeDebouncer::new(false, debounce_ms);
            let mut now = 0u64;
            let mut level = false;
            let mut changes = 0u64;
            let mut last_accepted: Option<u64> = None;

            for (gap, raw) in steps {
                now += gap;
                let changed = raw != level;
                level = raw;
                if changed {
                    changes += 1;
                }

                let accepted = debouncer.observe(raw, now);
                prop_assert!(!accepted || changed, "edge accepted without a level change");
                if accepted {
                    if let Some(previous) = last_accepted {
                        prop_assert!(now - previous > debounce_ms);
                    }
                    last_accepted = Some(now);
                }
                prop_assert_eq!(debouncer.last_state(), level);
            }
            prop_assert_eq!(debouncer.accepted() + debouncer.rejected(), changes);
        }
    }
}
