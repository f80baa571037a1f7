//! Normalized landmark → actuator display coordinates.

use crate::landmarks::Landmark;

pub const DEFAULT_DISPLAY_WIDTH: u32 = 128;
pub const DEFAULT_DISPLAY_HEIGHT: u32 = 64;

/// Absolute pan/tilt target in display coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionCommand {
    pub x: u32,
    pub y: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct DisplayMapper {
    width: u32,
    height: u32,
}

impl Default for DisplayMapper {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_WIDTH, DEFAULT_DISPLAY_HEIGHT)
    }
}

impl DisplayMapper {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scale a normalized point into the display grid.
    ///
    /// Scaling to frame pixels first and then to the display cancels out, so the
    /// frame size does not enter the result. Out-of-frame landmarks are clamped
    /// to the nearest edge cell.
    pub fn map(&self, point: Landmark) -> PositionCommand {
        PositionCommand {
            x: scale(point.x, self.width),
            y: scale(point.y, self.height),
        }
    }
}

fn scale(normalized: f32, extent: u32) -> u32 {
    if extent == 0 {
        return 0;
    }
    let max = (extent - 1) as f32;
    let value = if normalized.is_finite() {
        (normalized * extent as f32).round()
    } else {
        0.0
    };
    value.clamp(0.0, max) as u32
}
