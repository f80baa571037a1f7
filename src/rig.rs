//! The tracking loop.
//!
//! One synchronous loop pulls frames, alternates face and hand detection, and
//! drives the actuator. Only accepted triggers leave the loop, as tasks on the
//! coordinator's runner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::actuate::{ActuationCoordinator, ActuationTiming, TaskRunner, TriggerDecision};
use crate::archive::FrameArchiver;
use crate::config::RigConfig;
use crate::detect::LandmarkDetector;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::landmarks::{classify_thumbs_up, NOSE_TIP};
use crate::link::{Command, SharedLink};
use crate::mapping::{DisplayMapper, PositionCommand};
use crate::schedule::{TrackingMode, TrackingScheduler};
use crate::stability::{GestureStabilityTracker, MissPolicy};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// What a single frame produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Face branch: a nose was found and a position command was issued.
    Position(PositionCommand),
    NoFace,
    /// Hand branch: a hand was classified.
    Gesture {
        thumbs_up: bool,
        /// Set when the stability window was satisfied on this frame.
        trigger: Option<TriggerDecision>,
    },
    NoHand,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub face_frames: u64,
    pub hand_frames: u64,
    pub positions_sent: u64,
    pub link_errors: u64,
    pub triggers_accepted: u64,
}

pub struct Rig {
    scheduler: TrackingScheduler,
    face: Box<dyn LandmarkDetector>,
    hand: Box<dyn LandmarkDetector>,
    mapper: DisplayMapper,
    tracker: GestureStabilityTracker,
    coordinator: ActuationCoordinator,
    link: SharedLink,
    mirror: bool,
    stats: RunStats,
}

impl Rig {
    pub fn new(
        face: Box<dyn LandmarkDetector>,
        hand: Box<dyn LandmarkDetector>,
        mapper: DisplayMapper,
        tracker: GestureStabilityTracker,
        coordinator: ActuationCoordinator,
        link: SharedLink,
    ) -> Self {
        Self {
            scheduler: TrackingScheduler::new(),
            face,
            hand,
            mapper,
            tracker,
            coordinator,
            link,
            mirror: false,
            stats: RunStats::default(),
        }
    }

    /// Wire a rig from configuration and already-opened collaborators.
    pub fn from_config(
        cfg: &RigConfig,
        face: Box<dyn LandmarkDetector>,
        hand: Box<dyn LandmarkDetector>,
        link: SharedLink,
        archiver: Arc<dyn FrameArchiver>,
        runner: Box<dyn TaskRunner>,
    ) -> Self {
        let miss_policy = if cfg.gesture.reset_on_miss {
            MissPolicy::Reset
        } else {
            MissPolicy::Hold
        };
        let tracker =
            GestureStabilityTracker::new(cfg.gesture.stability).with_miss_policy(miss_policy);
        let coordinator =
            ActuationCoordinator::new(cfg.gesture.cooldown, link.clone(), archiver, runner)
                .with_timing(ActuationTiming {
                    shake_gap: cfg.actuator.shake_gap,
                    animate_delay: cfg.actuator.animate_delay,
                });
        let mapper = DisplayMapper::new(cfg.display.width, cfg.display.height);
        Self::new(face, hand, mapper, tracker, coordinator, link).with_mirror(cfg.camera.mirror)
    }

    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// Warm up both detectors.
    pub fn warm_up(&mut self) -> Result<()> {
        self.face.warm_up()?;
        self.hand.warm_up()
    }

    /// Process one frame captured at `now`.
    pub fn step(&mut self, frame: Frame, now: Instant) -> Result<StepOutcome> {
        let mut frame = frame.into_rgb()?;
        if self.mirror {
            frame = frame.mirrored()?;
        }
        self.stats.frames += 1;

        let outcome = match self.scheduler.next_mode() {
            TrackingMode::Face => {
                self.stats.face_frames += 1;
                self.track_face(&frame)
            }
            TrackingMode::Hand => {
                self.stats.hand_frames += 1;
                self.track_hand(&frame, now)
            }
        };
        Ok(outcome)
    }

    fn track_face(&mut self, frame: &Frame) -> StepOutcome {
        let face = match self.face.detect(frame) {
            Ok(face) => face,
            Err(err) => {
                log::warn!("face detector {} failed: {:#}", self.face.name(), err);
                None
            }
        };
        let Some(nose) = face.and_then(|set| set.get(NOSE_TIP)) else {
            return StepOutcome::NoFace;
        };

        let position = self.mapper.map(nose);
        match self.link.send(&Command::Position(position)) {
            Ok(()) => {
                self.stats.positions_sent += 1;
                log::debug!("position {},{}", position.x, position.y);
            }
            Err(err) => {
                self.stats.link_errors += 1;
                log::warn!("position command not delivered: {:#}", err);
            }
        }
        StepOutcome::Position(position)
    }

    fn track_hand(&mut self, frame: &Frame, now: Instant) -> StepOutcome {
        let hand = match self.hand.detect(frame) {
            Ok(hand) => hand,
            Err(err) => {
                log::warn!("hand detector {} failed: {:#}", self.hand.name(), err);
                None
            }
        };
        let Some(thumbs_up) = hand.as_ref().and_then(classify_thumbs_up) else {
            self.tracker.observe_miss();
            return StepOutcome::NoHand;
        };

        self.tracker.observe(thumbs_up, now);
        let trigger = if self.tracker.trigger_ready(now) {
            let decision = self.coordinator.on_trigger(now, frame);
            if decision.is_accepted() {
                self.stats.triggers_accepted += 1;
            }
            Some(decision)
        } else {
            None
        };
        StepOutcome::Gesture { thumbs_up, trigger }
    }

    /// Run until the source ends, fails, `shutdown` is set, or `max_frames` is reached.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        shutdown: &AtomicBool,
        max_frames: Option<u64>,
    ) -> RunStats {
        let mut last_health_log = Instant::now();
        loop {
            if shutdown.load(Ordering::SeqCst) {
                log::info!("shutdown requested");
                break;
            }
            if max_frames.is_some_and(|max| self.stats.frames >= max) {
                log::info!("frame limit reached");
                break;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("frame source exhausted");
                    break;
                }
                Err(err) => {
                    log::error!("frame source failed: {:#}", err);
                    break;
                }
            };

            if let Err(err) = self.step(frame, Instant::now()) {
                log::warn!("frame skipped: {:#}", err);
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "source health={} frames={} positions={} triggers={}",
                    source.is_healthy(),
                    source.frames_captured(),
                    self.stats.positions_sent,
                    self.stats.triggers_accepted
                );
                last_health_log = Instant::now();
            }
        }
        self.stats
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn tracker(&self) -> &GestureStabilityTracker {
        &self.tracker
    }

    pub fn coordinator(&self) -> &ActuationCoordinator {
        &self.coordinator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuate::InlineRunner;
    use crate::detect::{DetectorKind, ScriptedDetector};
    use crate::landmarks::{Landmark, LandmarkSet};
    use crate::link::RecordingLink;
    use std::path::PathBuf;

    struct NullArchiver;

    impl FrameArchiver for NullArchiver {
        fn save(&self, _frame: &Frame) -> Result<PathBuf> {
            Ok(PathBuf::from("/dev/null"))
        }
    }

    fn nose_at(x: f32, y: f32) -> LandmarkSet {
        LandmarkSet::from_indexed(468, &[(NOSE_TIP, Landmark::new(x, y))], 0.9)
    }

    fn rig(face: ScriptedDetector, hand: ScriptedDetector, link: SharedLink) -> Rig {
        let coordinator = ActuationCoordinator::new(
            Duration::from_secs(10),
            link.clone(),
            Arc::new(NullArchiver),
            Box::new(InlineRunner),
        )
        .with_timing(ActuationTiming::immediate());
        Rig::new(
            Box::new(face),
            Box::new(hand),
            DisplayMapper::default(),
            GestureStabilityTracker::default(),
            coordinator,
            link,
        )
    }

    #[test]
    fn face_frames_emit_positions_and_hand_frames_do_not() -> Result<()> {
        let link = RecordingLink::new();
        let log = link.log();
        let face = ScriptedDetector::new(DetectorKind::Face).repeating(nose_at(0.5, 0.5));
        let hand = ScriptedDetector::new(DetectorKind::Hand);
        let mut rig = rig(face, hand, SharedLink::new(link));

        let t0 = Instant::now();
        let frame = Frame::solid(640, 480, [0, 0, 0]);
        assert_eq!(
            rig.step(frame.clone(), t0)?,
            StepOutcome::Position(PositionCommand { x: 64, y: 32 })
        );
        assert_eq!(rig.step(frame.clone(), t0)?, StepOutcome::NoHand);
        assert_eq!(
            rig.step(frame, t0)?,
            StepOutcome::Position(PositionCommand { x: 64, y: 32 })
        );
        assert_eq!(log.snapshot().len(), 2);
        assert_eq!(rig.stats().face_frames, 2);
        assert_eq!(rig.stats().hand_frames, 1);
        Ok(())
    }

    #[derive(Default)]
    struct KeepingArchiver {
        frames: std::sync::Mutex<Vec<Frame>>,
    }

    impl FrameArchiver for KeepingArchiver {
        fn save(&self, frame: &Frame) -> Result<PathBuf> {
            self.frames
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .push(frame.clone());
            Ok(PathBuf::from("mem/0.jpg"))
        }
    }

    #[test]
    fn archived_frame_is_the_mirrored_frame() -> Result<()> {
        use crate::landmarks::{INDEX_FINGER_TIP, THUMB_BASE, THUMB_TIP};

        let link = SharedLink::new(RecordingLink::new());
        let archiver = Arc::new(KeepingArchiver::default());
        let coordinator = ActuationCoordinator::new(
            Duration::from_secs(10),
            link.clone(),
            archiver.clone(),
            Box::new(InlineRunner),
        )
        .with_timing(ActuationTiming::immediate());
        let thumbs_up = LandmarkSet::from_indexed(
            21,
            &[
                (THUMB_TIP, Landmark::new(0.5, 0.2)),
                (THUMB_BASE, Landmark::new(0.5, 0.6)),
                (INDEX_FINGER_TIP, Landmark::new(0.45, 0.5)),
            ],
            0.9,
        );
        let mut rig = Rig::new(
            Box::new(ScriptedDetector::new(DetectorKind::Face)),
            Box::new(ScriptedDetector::new(DetectorKind::Hand).repeating(thumbs_up)),
            DisplayMapper::default(),
            GestureStabilityTracker::new(Duration::ZERO),
            coordinator,
            link,
        )
        .with_mirror(true);

        // Left pixel red, right pixel blue.
        let frame = Frame::new(vec![200, 0, 0, 0, 0, 200], 2, 1, crate::frame::PixelFormat::Rgb24)?;
        let now = Instant::now();
        assert_eq!(rig.step(frame.clone(), now)?, StepOutcome::NoFace);
        let outcome = rig.step(frame, now)?;
        assert!(matches!(
            outcome,
            StepOutcome::Gesture {
                trigger: Some(TriggerDecision::Accepted),
                ..
            }
        ));

        let frames = archiver
            .frames
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pixels(), &[0, 0, 200, 200, 0, 0]);
        Ok(())
    }

    #[test]
    fn link_failures_do_not_stop_tracking() -> Result<()> {
        let face = ScriptedDetector::new(DetectorKind::Face).repeating(nose_at(0.1, 0.1));
        let mut rig = rig(
            face,
            ScriptedDetector::new(DetectorKind::Hand),
            SharedLink::new(RecordingLink::failing()),
        );
        let frame = Frame::solid(4, 4, [0, 0, 0]);
        rig.step(frame.clone(), Instant::now())?;
        rig.step(frame.clone(), Instant::now())?;
        rig.step(frame, Instant::now())?;
        assert_eq!(rig.stats().link_errors, 2);
        assert_eq!(rig.stats().positions_sent, 0);
        Ok(())
    }
}
