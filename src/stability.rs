//! Thumbs-up debouncing.
//!
//! A raw per-frame classification becomes a trigger only after it has held
//! continuously for the stability window. One negative frame cancels the
//! window; there is no negative debounce.
//!
//! The trigger condition is level-triggered: once the window is satisfied,
//! `trigger_ready` stays true on every following positive frame. The
//! actuation cooldown is what keeps the rig from firing repeatedly.

use std::time::{Duration, Instant};

pub const DEFAULT_STABILITY_WINDOW: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StabilityState {
    Unstable,
    Stable { since: Instant },
}

/// What to do with a hand-tracking frame where no hand was found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissPolicy {
    /// Leave the state untouched; a dropped detection does not cancel the window.
    #[default]
    Hold,
    /// Treat the miss like a negative classification.
    Reset,
}

#[derive(Debug)]
pub struct GestureStabilityTracker {
    state: StabilityState,
    window: Duration,
    miss_policy: MissPolicy,
}

impl GestureStabilityTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            state: StabilityState::Unstable,
            window,
            miss_policy: MissPolicy::Hold,
        }
    }

    pub fn with_miss_policy(mut self, policy: MissPolicy) -> Self {
        self.miss_policy = policy;
        self
    }

    /// Feed one classification. Returns the resulting state.
    pub fn observe(&mut self, thumbs_up: bool, now: Instant) -> StabilityState {
        match (thumbs_up, self.state) {
            (false, StabilityState::Stable { .. }) => {
                log::debug!("gesture released; stability reset");
                self.state = StabilityState::Unstable;
            }
            (false, StabilityState::Unstable) => {}
            (true, StabilityState::Unstable) => {
                log::debug!("thumbs-up seen; stability window started");
                self.state = StabilityState::Stable { since: now };
            }
            (true, StabilityState::Stable { .. }) => {}
        }
        self.state
    }

    /// Record a hand-tracking frame with no usable hand.
    pub fn observe_miss(&mut self) -> StabilityState {
        if self.miss_policy == MissPolicy::Reset && self.is_stable() {
            log::debug!("hand lost; stability reset");
            self.state = StabilityState::Unstable;
        }
        self.state
    }

    /// Stable for at least the window as of `now`.
    pub fn trigger_ready(&self, now: Instant) -> bool {
        match self.state {
            StabilityState::Stable { since } => now.saturating_duration_since(since) >= self.window,
            StabilityState::Unstable => false,
        }
    }

    pub fn state(&self) -> StabilityState {
        self.state
    }

    pub fn is_stable(&self) -> bool {
        matches!(self.state, StabilityState::Stable { .. })
    }

    pub fn stable_since(&self) -> Option<Instant> {
        match self.state {
            StabilityState::Stable { since } => Some(since),
            StabilityState::Unstable => None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for GestureStabilityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STABILITY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, secs: f64) -> Instant {
        base + Duration::from_secs_f64(secs)
    }

    #[test]
    fn first_positive_makes_stable_and_window_gates_trigger() {
        let t0 = Instant::now();
        let mut tracker = GestureStabilityTracker::default();
        assert_eq!(tracker.state(), StabilityState::Unstable);

        let mut ready = Vec::new();
        for step in 0..6 {
            let now = at(t0, step as f64 * 0.5);
            tracker.observe(true, now);
            assert_eq!(tracker.stable_since(), Some(t0));
            ready.push(tracker.trigger_ready(now));
        }
        assert_eq!(ready, vec![false, false, false, false, true, true]);
    }

    #[test]
    fn single_negative_resets_and_restarts_timer() {
        let t0 = Instant::now();
        let mut tracker = GestureStabilityTracker::default();
        tracker.observe(true, t0);
        tracker.observe(true, at(t0, 1.5));
        tracker.observe(false, at(t0, 1.9));
        assert!(!tracker.is_stable());
        assert!(!tracker.trigger_ready(at(t0, 2.0)));

        tracker.observe(true, at(t0, 2.0));
        assert_eq!(tracker.stable_since(), Some(at(t0, 2.0)));
        assert!(!tracker.trigger_ready(at(t0, 3.5)));
        tracker.observe(true, at(t0, 4.0));
        assert!(tracker.trigger_ready(at(t0, 4.0)));
    }

    #[test]
    fn miss_holds_state_by_default() {
        let t0 = Instant::now();
        let mut tracker = GestureStabilityTracker::default();
        tracker.observe(true, t0);
        tracker.observe_miss();
        assert_eq!(tracker.stable_since(), Some(t0));
        assert!(tracker.trigger_ready(at(t0, 2.0)));
    }

    #[test]
    fn miss_resets_when_configured() {
        let t0 = Instant::now();
        let mut tracker = GestureStabilityTracker::default().with_miss_policy(MissPolicy::Reset);
        tracker.observe(true, t0);
        assert_eq!(tracker.observe_miss(), StabilityState::Unstable);
        assert!(!tracker.trigger_ready(at(t0, 5.0)));
    }

    #[test]
    fn zero_window_triggers_on_first_positive() {
        let t0 = Instant::now();
        let mut tracker = GestureStabilityTracker::new(Duration::ZERO);
        tracker.observe(true, t0);
        assert!(tracker.trigger_ready(t0));
    }
}
