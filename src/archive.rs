//! Capture archive: writes triggered frames to disk as JPEG.
//!
//! File names carry a second-granularity local timestamp plus milliseconds,
//! e.g. `captured_image_20261019_153012_481.jpg`. Files are created with
//! `create_new`, and a numeric suffix is appended if the name is already taken,
//! so two captures in the same second never overwrite each other.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::frame::{Frame, PixelFormat};

pub const DEFAULT_OUTPUT_DIR: &str = "captured_images";
const FILE_PREFIX: &str = "captured_image";
const MAX_SUFFIX: u32 = 1000;

/// Persists a frame and reports where it went.
pub trait FrameArchiver: Send + Sync {
    fn save(&self, frame: &Frame) -> Result<PathBuf>;
}

pub struct JpegArchiver {
    root: PathBuf,
    quality: u8,
}

impl JpegArchiver {
    /// Create the output directory if needed.
    pub fn new<P: AsRef<Path>>(root: P, quality: u8) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("create capture directory {}", root.display()))?;
        Ok(Self {
            root,
            quality: quality.clamp(1, 100),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn create_unique(&self, stem: &str) -> Result<(PathBuf, File)> {
        for suffix in 0..MAX_SUFFIX {
            let name = if suffix == 0 {
                format!("{stem}.jpg")
            } else {
                format!("{stem}-{suffix}.jpg")
            };
            let path = self.root.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("create capture file {}", path.display())))
                }
            }
        }
        Err(anyhow!("no free capture file name for {}", stem))
    }
}

pub(crate) fn timestamp_stem() -> String {
    let now = chrono::Local::now();
    format!("{}_{}", FILE_PREFIX, now.format("%Y%m%d_%H%M%S_%3f"))
}

impl FrameArchiver for JpegArchiver {
    fn save(&self, frame: &Frame) -> Result<PathBuf> {
        if frame.format != PixelFormat::Rgb24 {
            return Err(anyhow!("archiver expects RGB24 frames, got {:?}", frame.format));
        }
        let (path, file) = self.create_unique(&timestamp_stem())?;
        if let Err(err) = write_jpeg(file, frame, self.quality) {
            if let Err(remove_err) = fs::remove_file(&path) {
                log::warn!("could not remove partial capture {}: {}", path.display(), remove_err);
            }
            return Err(err.context(format!("write capture {}", path.display())));
        }
        Ok(path)
    }
}

fn write_jpeg(file: File, frame: &Frame, quality: u8) -> Result<()> {
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode(frame.pixels(), frame.width, frame.height, ExtendedColorType::Rgb8)
        .context("encode jpeg")?;
    writer.flush().context("flush jpeg")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_output_directory_and_writes_jpeg() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().join("captured_images");
        let archiver = JpegArchiver::new(&root, 90)?;
        assert!(root.is_dir());

        let path = archiver.save(&Frame::solid(8, 6, [200, 40, 40]))?;
        assert!(path.starts_with(&root));
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("bad file name"))?;
        assert!(name.starts_with("captured_image_"));
        assert!(name.ends_with(".jpg"));

        let decoded = image::open(&path)?;
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
        Ok(())
    }

    #[test]
    fn same_second_saves_do_not_collide() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let archiver = JpegArchiver::new(temp.path(), 80)?;
        let frame = Frame::solid(4, 4, [0, 0, 0]);

        let paths: Vec<PathBuf> = (0..5)
            .map(|_| archiver.save(&frame))
            .collect::<Result<_>>()?;
        let mut unique = paths.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), paths.len());
        assert_eq!(fs::read_dir(temp.path())?.count(), 5);
        Ok(())
    }

    #[test]
    fn failed_encode_leaves_no_file_behind() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let archiver = JpegArchiver::new(temp.path(), 80)?;
        // Baseline JPEG caps each dimension at 65535.
        let oversized = Frame::solid(70_000, 1, [0, 0, 0]);
        assert!(archiver.save(&oversized).is_err());
        assert_eq!(fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn taken_name_gets_numeric_suffix() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let archiver = JpegArchiver::new(temp.path(), 80)?;
        let (first, _) = archiver.create_unique("captured_image_20260101_000000_000")?;
        let (second, _) = archiver.create_unique("captured_image_20260101_000000_000")?;
        assert_ne!(first, second);
        assert!(second.ends_with("captured_image_20260101_000000_000-1.jpg"));
        Ok(())
    }
}
