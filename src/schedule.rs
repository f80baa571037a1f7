//! Face/hand alternation.
//!
//! Running both landmark models on every frame is not needed for smooth
//! tracking, so even frames go to the face detector and odd frames to the
//! hand detector.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingMode {
    Face,
    Hand,
}

#[derive(Debug, Default)]
pub struct TrackingScheduler {
    frame_index: u64,
}

impl TrackingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode for an absolute frame index.
    pub fn select(frame_index: u64) -> TrackingMode {
        if frame_index % 2 == 0 {
            TrackingMode::Face
        } else {
            TrackingMode::Hand
        }
    }

    /// Mode for the current frame; advances the counter.
    pub fn next_mode(&mut self) -> TrackingMode {
        let mode = Self::select(self.frame_index);
        self.frame_index = self.frame_index.wrapping_add(1);
        mode
    }

    /// Frames scheduled so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_frames_track_faces() {
        for n in [0u64, 2, 4, 1_000, u64::MAX - 1] {
            assert_eq!(TrackingScheduler::select(n), TrackingMode::Face);
        }
        for n in [1u64, 3, 999, u64::MAX] {
            assert_eq!(TrackingScheduler::select(n), TrackingMode::Hand);
        }
    }

    #[test]
    fn next_mode_alternates_strictly() {
        let mut scheduler = TrackingScheduler::new();
        let modes: Vec<_> = (0..6).map(|_| scheduler.next_mode()).collect();
        assert_eq!(
            modes,
            vec![
                TrackingMode::Face,
                TrackingMode::Hand,
                TrackingMode::Face,
                TrackingMode::Hand,
                TrackingMode::Face,
                TrackingMode::Hand,
            ]
        );
        assert_eq!(scheduler.frame_index(), 6);
    }
}
