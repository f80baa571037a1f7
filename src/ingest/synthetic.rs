//! Synthetic frame source for `stub://` cameras.

use anyhow::Result;

use super::FrameSource;
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Stop after this many frames. `None` runs forever.
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            label: "stub://webcam".to_string(),
            width: 640,
            height: 480,
            frame_limit: None,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("{} (synthetic)", self.config.label)
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("SyntheticSource: connected to {}", self.config.label);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        let pixels = self.generate_pixels();
        self.frame_count += 1;
        let frame = Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            crate::frame::PixelFormat::Rgb24,
        )?;
        Ok(Some(frame))
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_frame_limit() -> Result<()> {
        let mut source = SyntheticSource::new(SyntheticConfig {
            width: 4,
            height: 4,
            frame_limit: Some(2),
            ..SyntheticConfig::default()
        });
        source.connect()?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.frames_captured(), 2);
        Ok(())
    }

    #[test]
    fn consecutive_frames_differ() -> Result<()> {
        let mut source = SyntheticSource::new(SyntheticConfig {
            width: 4,
            height: 4,
            ..SyntheticConfig::default()
        });
        let a = source.next_frame()?.map(|f| f.pixels().to_vec());
        let b = source.next_frame()?.map(|f| f.pixels().to_vec());
        assert_ne!(a, b);
        Ok(())
    }
}
