//! Frame ingestion sources.
//!
//! - Synthetic sources (`stub://...`) for dry runs and tests
//! - Directories of still images, replayed in name order (finite)
//! - USB/V4L2 webcams (feature: ingest-v4l2)
//!
//! Every source implements `FrameSource`. `Ok(None)` from `next_frame` marks the
//! end of the stream; the tracking loop stops on it.

mod image_dir;
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::config::CameraSettings;
use crate::frame::Frame;

pub use image_dir::ImageDirSource;
pub(crate) use normalize::normalize_to_rgb;
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// A continuous supply of camera frames.
pub trait FrameSource {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Open the underlying device. Called once before the first `next_frame`.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn frames_captured(&self) -> u64;
}

/// Pick a source implementation for the configured camera string.
pub fn open_source(settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    let source = settings.source.as_str();
    if source.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig {
            label: source.to_string(),
            width: settings.width,
            height: settings.height,
            frame_limit: None,
        })));
    }
    if Path::new(source).is_dir() {
        return Ok(Box::new(ImageDirSource::new(source)?));
    }
    if source.contains("://") {
        return Err(anyhow!(
            "camera source '{}' is not supported (use a device path, a directory or stub://)",
            source
        ));
    }
    open_device(settings)
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::new(V4l2Config {
        device: settings.source.clone(),
        target_fps: settings.target_fps,
        width: settings.width,
        height: settings.height,
    })))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "camera device {} requires the ingest-v4l2 feature",
        settings.source
    ))
}
