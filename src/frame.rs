//! Camera frames.
//!
//! - `Frame`: owned pixel buffer with dimensions and pixel layout.
//! - `PixelFormat`: layouts produced by the ingest sources.
//!
//! Sources hand out frames in whatever layout the device produced. The tracking
//! loop calls `Frame::into_rgb` (and `mirrored` when configured) once per frame so
//! detectors and the archiver always see packed RGB24.

use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Nv12,
}

/// A single camera frame. Owned by the iteration that polled it.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl Frame {
    /// Wrap a pixel buffer, checking its length against the layout.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let expected = expected_len(width, height, format)?;
        if data.len() != expected {
            return Err(anyhow!(
                "{:?} frame length mismatch: expected {}, got {}",
                format,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    /// Uniform RGB frame, mostly useful for synthetic sources and tests.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgb24,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Convert to packed RGB24. A no-op for frames that already are.
    pub fn into_rgb(self) -> Result<Self> {
        if self.format == PixelFormat::Rgb24 {
            return Ok(self);
        }
        let data = crate::ingest::normalize_to_rgb(&self.data, self.width, self.height, self.format)?;
        Ok(Self {
            data,
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgb24,
        })
    }

    /// Flip horizontally (selfie view). Requires a packed 3-byte layout.
    pub fn mirrored(mut self) -> Result<Self> {
        if self.format == PixelFormat::Nv12 {
            return Err(anyhow!("cannot mirror NV12 frame; convert to RGB first"));
        }
        let row_len = self.width as usize * 3;
        if row_len == 0 {
            return Ok(self);
        }
        for row in self.data.chunks_exact_mut(row_len) {
            let w = self.width as usize;
            for x in 0..w / 2 {
                let (l, r) = (x * 3, (w - 1 - x) * 3);
                for c in 0..3 {
                    row.swap(l + c, r + c);
                }
            }
        }
        Ok(self)
    }
}

fn expected_len(width: u32, height: u32, format: PixelFormat) -> Result<usize> {
    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    let len = match format {
        PixelFormat::Rgb24 | PixelFormat::Bgr24 => pixels.checked_mul(3),
        PixelFormat::Nv12 => pixels.checked_add(pixels / 2),
    };
    len.ok_or_else(|| anyhow!("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_buffer() {
        assert!(Frame::new(vec![0u8; 5], 2, 1, PixelFormat::Rgb24).is_err());
    }

    #[test]
    fn mirror_swaps_columns() -> Result<()> {
        let data = vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4, 5, 5, 5, 6, 6, 6];
        let frame = Frame::new(data, 3, 2, PixelFormat::Rgb24)?.mirrored()?;
        assert_eq!(
            frame.pixels(),
            &[3, 3, 3, 2, 2, 2, 1, 1, 1, 6, 6, 6, 5, 5, 5, 4, 4, 4]
        );
        Ok(())
    }

    #[test]
    fn bgr_becomes_rgb() -> Result<()> {
        let frame = Frame::new(vec![10, 20, 30], 1, 1, PixelFormat::Bgr24)?.into_rgb()?;
        assert_eq!(frame.format, PixelFormat::Rgb24);
        assert_eq!(frame.pixels(), &[30, 20, 10]);
        Ok(())
    }
}
