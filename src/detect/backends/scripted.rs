use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::{DetectorKind, LandmarkDetector};
use crate::frame::Frame;
use crate::landmarks::LandmarkSet;

/// Stub backend that replays a fixed script of detections.
///
/// Each `detect` call pops the next scripted entry. Once the script runs out
/// the detector keeps returning the `repeat` set, if any.
pub struct ScriptedDetector {
    kind: DetectorKind,
    script: VecDeque<Option<LandmarkSet>>,
    repeat: Option<LandmarkSet>,
    min_confidence: f32,
    calls: u64,
}

impl ScriptedDetector {
    pub fn new(kind: DetectorKind) -> Self {
        Self {
            kind,
            script: VecDeque::new(),
            repeat: None,
            min_confidence: 0.0,
            calls: 0,
        }
    }

    pub fn with_script<I>(mut self, script: I) -> Self
    where
        I: IntoIterator<Item = Option<LandmarkSet>>,
    {
        self.script.extend(script);
        self
    }

    pub fn repeating(mut self, set: LandmarkSet) -> Self {
        self.repeat = Some(set);
        self
    }

    /// Drop sets whose confidence falls below `threshold`.
    pub fn with_min_confidence(mut self, threshold: f32) -> Self {
        self.min_confidence = threshold;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Option<LandmarkSet>> {
        self.calls += 1;
        let next = match self.script.pop_front() {
            Some(entry) => entry,
            None => self.repeat.clone(),
        };
        Ok(next.filter(|set| set.confidence >= self.min_confidence))
    }
}
