//! Alarm hysteresis state machine.
//!
//! ```text
//!            anomaly && enabled, count reaches N
//!   Idle ─────────────────────────────────────────► Active
//!    ▲  ◄─────────────────────────────────────────    │
//!    │          !anomaly || !enabled (immediate)      │
//!    └── anomaly && enabled, count < N (stay Idle)    └── anomaly && enabled (stay)
//! ```
//!
//! Activation is debounced by requiring N consecutive anomalous ticks.
//! Deactivation is instantaneous: one clean tick, or the kill switch, silences
//! the buzzer and resets the count to zero.

use tracing::{info, warn};

use crate::types::{AlarmPhase, AlarmState};

/// Edge produced by one [`AlarmController::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmTransition {
    /// No phase change.
    None,
    /// Idle → Active on this tick.
    Activated,
    /// Active → Idle on this tick.
    Deactivated,
}

/// Consecutive-count hysteresis controller.
#[derive(Debug, Clone)]
pub struct AlarmController {
    consecutive_alerts: u32,
    state: AlarmState,
}

impl AlarmController {
    /// `consecutive_alerts` is clamped to at least 1.
    pub fn new(consecutive_alerts: u32) -> Self {
        Self {
            consecutive_alerts: consecutive_alerts.max(1),
            state: AlarmState::default(),
        }
    }

    /// Advance one tick.
    pub fn update(&mut self, is_anomaly: bool, system_enabled: bool) -> AlarmTransition {
        if is_anomaly && system_enabled {
            self.state.consecutive_anomaly_count =
                self.state.consecutive_anomaly_count.saturating_add(1);

            if self.state.consecutive_anomaly_count >= self.consecutive_alerts
                && self.state.phase == AlarmPhase::Idle
            {
                self.state.phase = AlarmPhase::Active;
                return AlarmTransition::Activated;
            }
            return AlarmTransition::None;
        }

        self.state.consecutive_anomaly_count = 0;
        if self.state.phase == AlarmPhase::Active {
            self.state.phase = AlarmPhase::Idle;
            return AlarmTransition::Deactivated;
        }
        AlarmTransition::None
    }

    /// Kill switch path: drop to Idle without an evaluation.
    pub fn force_idle(&mut self) -> AlarmTransition {
        self.update(false, false)
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn consecutive_anomaly_count(&self) -> u32 {
        self.state.consecutive_anomaly_count
    }
}

/// Log a transition with the reason that caused it.
pub(crate) fn log_transition(transition: AlarmTransition, reason: &str, system_enabled: bool) {
    match transition {
        AlarmTransition::Activated => warn!(reason, "ALARM activated"),
        AlarmTransition::Deactivated if !system_enabled => {
            info!("alarm silenced by kill switch")
        }
        AlarmTransition::Deactivated => info!("alarm cleared"),
        AlarmTransition::None => {}
    }
}
