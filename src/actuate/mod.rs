//! Trigger rate limiting and actuation dispatch.
//!
//! An accepted trigger shakes the rig, plays the ready animation after a short
//! settle, and archives the triggering frame. Both side effects run as
//! fire-and-forget tasks so the tracking loop keeps pulling frames.

pub mod task;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::archive::FrameArchiver;
use crate::frame::Frame;
use crate::link::{Command, SharedLink};

pub use task::{InlineRunner, Task, TaskRunner, ThreadRunner};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

/// Delays inside one actuation sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActuationTiming {
    /// Pause between SHAKE and RESET.
    pub shake_gap: Duration,
    /// Settle between RESET and ANIMATE.
    pub animate_delay: Duration,
}

impl Default for ActuationTiming {
    fn default() -> Self {
        Self {
            shake_gap: Duration::from_millis(10),
            animate_delay: Duration::from_secs(1),
        }
    }
}

impl ActuationTiming {
    pub fn immediate() -> Self {
        Self {
            shake_gap: Duration::ZERO,
            animate_delay: Duration::ZERO,
        }
    }

    /// Sleep time of one sequence, excluding the writes themselves.
    pub fn sequence_duration(&self) -> Duration {
        self.shake_gap + self.animate_delay
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerDecision {
    Accepted,
    CoolingDown { remaining: Duration },
}

impl TriggerDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TriggerDecision::Accepted)
    }
}

/// Minimum spacing between accepted triggers, measured from the last
/// accepted one. Rejected calls leave the state alone.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    last_accepted: Option<Instant>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: None,
        }
    }

    pub fn try_acquire(&mut self, now: Instant) -> TriggerDecision {
        if let Some(last) = self.last_accepted {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.cooldown {
                return TriggerDecision::CoolingDown {
                    remaining: self.cooldown - elapsed,
                };
            }
        }
        self.last_accepted = Some(now);
        TriggerDecision::Accepted
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

pub struct ActuationCoordinator {
    limiter: RateLimiter,
    link: SharedLink,
    archiver: Arc<dyn FrameArchiver>,
    runner: Box<dyn TaskRunner>,
    timing: ActuationTiming,
    accepted: u64,
}

impl ActuationCoordinator {
    pub fn new(
        cooldown: Duration,
        link: SharedLink,
        archiver: Arc<dyn FrameArchiver>,
        runner: Box<dyn TaskRunner>,
    ) -> Self {
        Self {
            limiter: RateLimiter::new(cooldown),
            link,
            archiver,
            runner,
            timing: ActuationTiming::default(),
            accepted: 0,
        }
    }

    pub fn with_timing(mut self, timing: ActuationTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Handle a frame on which the stability window is satisfied.
    pub fn on_trigger(&mut self, now: Instant, frame: &Frame) -> TriggerDecision {
        let decision = self.limiter.try_acquire(now);
        match decision {
            TriggerDecision::Accepted => {
                self.accepted += 1;
                log::info!("thumbs-up held; trigger #{} accepted", self.accepted);
                self.dispatch_actuation();
                self.dispatch_capture(frame.clone());
            }
            TriggerDecision::CoolingDown { remaining } => {
                log::debug!("trigger ignored; cooldown {:.1}s left", remaining.as_secs_f32());
            }
        }
        decision
    }

    fn dispatch_actuation(&self) {
        let link = self.link.clone();
        let timing = self.timing;
        self.runner
            .submit("actuate", Box::new(move || run_actuation(&link, timing)));
    }

    fn dispatch_capture(&self, frame: Frame) {
        let archiver = Arc::clone(&self.archiver);
        self.runner.submit(
            "capture",
            Box::new(move || {
                let path = archiver.save(&frame)?;
                log::info!("picture taken and saved as: {}", path.display());
                Ok(())
            }),
        );
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.limiter.last_accepted()
    }
}

fn run_actuation(link: &SharedLink, timing: ActuationTiming) -> Result<()> {
    link.in_sequence(|link| {
        link.send(&Command::Shake)?;
        pause(timing.shake_gap);
        link.send(&Command::Reset)?;
        pause(timing.animate_delay);
        link.send(&Command::Animate)
    })
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}
