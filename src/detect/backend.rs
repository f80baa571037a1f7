use anyhow::Result;

use crate::frame::Frame;
use crate::landmarks::LandmarkSet;

/// Which anatomy a detector locates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    Face,
    Hand,
}

/// Landmark detector backend.
///
/// Implementations receive packed RGB24 frames and return at most one
/// landmark set (the most prominent face or hand). "Nothing found" is
/// `Ok(None)`, never an error.
pub trait LandmarkDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    fn kind(&self) -> DetectorKind;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>>;

    /// Optional warm-up hook, run once at startup.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
