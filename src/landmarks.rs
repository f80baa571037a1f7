//! Landmark sets and gesture classification.
//!
//! Indices follow the MediaPipe face-mesh and hand topologies, which is what
//! the landmark backends are trained against.

/// Nose tip in the face mesh.
pub const NOSE_TIP: usize = 1;
/// Thumb MCP joint, used as the thumb base.
pub const THUMB_BASE: usize = 2;
pub const THUMB_TIP: usize = 4;
pub const INDEX_FINGER_TIP: usize = 8;

/// A single normalized landmark. `x`/`y` are fractions of the frame size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Ordered landmark points produced by one detection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
    /// Detector confidence for the set as a whole.
    pub confidence: f32,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>, confidence: f32) -> Self {
        Self { points, confidence }
    }

    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Convenience for building sparse sets: every index not listed sits at (0, 0).
    pub fn from_indexed(len: usize, entries: &[(usize, Landmark)], confidence: f32) -> Self {
        let mut points = vec![Landmark::default(); len];
        for (index, landmark) in entries {
            if let Some(slot) = points.get_mut(*index) {
                *slot = *landmark;
            }
        }
        Self { points, confidence }
    }
}

/// Thumbs-up: the thumb tip sits above both the index fingertip and the thumb base.
///
/// Image y grows downward. Returns `None` when the set lacks the needed points.
pub fn classify_thumbs_up(hand: &LandmarkSet) -> Option<bool> {
    let tip = hand.get(THUMB_TIP)?;
    let base = hand.get(THUMB_BASE)?;
    let index = hand.get(INDEX_FINGER_TIP)?;
    Some(tip.y < index.y && tip.y < base.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(tip_y: f32, base_y: f32, index_y: f32) -> LandmarkSet {
        LandmarkSet::from_indexed(
            21,
            &[
                (THUMB_TIP, Landmark::new(0.5, tip_y)),
                (THUMB_BASE, Landmark::new(0.5, base_y)),
                (INDEX_FINGER_TIP, Landmark::new(0.5, index_y)),
            ],
            0.9,
        )
    }

    #[test]
    fn raised_thumb_is_thumbs_up() {
        assert_eq!(classify_thumbs_up(&hand(0.2, 0.6, 0.5)), Some(true));
    }

    #[test]
    fn thumb_below_index_tip_is_not() {
        assert_eq!(classify_thumbs_up(&hand(0.4, 0.6, 0.3)), Some(false));
        assert_eq!(classify_thumbs_up(&hand(0.7, 0.6, 0.8)), Some(false));
    }

    #[test]
    fn truncated_set_is_unclassified() {
        let set = LandmarkSet::new(vec![Landmark::default(); 5], 0.9);
        assert_eq!(classify_thumbs_up(&set), None);
    }
}
