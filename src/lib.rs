//! Gesture rig
//!
//! Webcam-driven control loop for a small pan/tilt display rig. Even frames run
//! face landmark detection and steer the rig toward the nose tip; odd frames run
//! hand landmark detection and watch for a thumbs-up. A thumbs-up held for the
//! stability window shakes the rig, plays its ready animation and saves the
//! frame to disk, at most once per cooldown.
//!
//! # Module Structure
//!
//! - `frame`, `ingest`: frames and the sources that produce them
//! - `detect`, `landmarks`: landmark backends and gesture classification
//! - `schedule`, `mapping`, `stability`: per-frame tracking logic
//! - `actuate`, `link`, `archive`: side effects (serial commands, captures)
//! - `rig`: the loop tying it together
//! - `config`, `ui`: daemon plumbing

pub mod actuate;
pub mod archive;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod landmarks;
pub mod link;
pub mod mapping;
pub mod rig;
pub mod schedule;
pub mod stability;
pub mod ui;

pub use actuate::{
    ActuationCoordinator, ActuationTiming, InlineRunner, RateLimiter, TaskRunner, ThreadRunner,
    TriggerDecision,
};
pub use archive::{FrameArchiver, JpegArchiver};
pub use config::RigConfig;
pub use detect::{build_detector, DetectorKind, LandmarkDetector, ScriptedDetector};
pub use frame::{Frame, PixelFormat};
pub use ingest::{open_source, FrameSource, ImageDirSource, SyntheticConfig, SyntheticSource};
pub use landmarks::{classify_thumbs_up, Landmark, LandmarkSet};
pub use link::{open_link, ActuatorLink, Command, RecordingLink, RetryPolicy, SharedLink};
pub use mapping::{DisplayMapper, PositionCommand};
pub use rig::{Rig, RunStats, StepOutcome};
pub use schedule::{TrackingMode, TrackingScheduler};
pub use stability::{GestureStabilityTracker, MissPolicy, StabilityState};
