#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectorKind, LandmarkDetector};
use crate::frame::{Frame, PixelFormat};
use crate::landmarks::{Landmark, LandmarkSet};

/// Tract-based backend for ONNX landmark models.
///
/// Expects a single-subject landmark regressor (face mesh or hand landmark
/// model) taking a 1x3xHxW RGB tensor in [0, 1]. Output 0 holds
/// `landmark_count * 3` coordinates in model input pixels; output 1, when
/// present, holds a presence logit.
pub struct TractDetector {
    kind: DetectorKind,
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    landmark_count: usize,
    confidence_threshold: f32,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        kind: DetectorKind,
        model_path: P,
        width: u32,
        height: u32,
        landmark_count: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            kind,
            model,
            width,
            height,
            landmark_count,
            confidence_threshold: 0.7,
        })
    }

    /// Override the default presence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Nearest-neighbour resample of the frame into the model input tensor.
    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.format != PixelFormat::Rgb24 {
            return Err(anyhow!("tract backend expects RGB24 frames"));
        }
        if frame.width == 0 || frame.height == 0 {
            return Err(anyhow!("empty frame"));
        }
        let pixels = frame.pixels();
        let src_w = frame.width as usize;
        let src_h = frame.height as usize;
        let dst_w = self.width as usize;
        let dst_h = self.height as usize;

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, dst_h, dst_w),
            |(_, channel, y, x)| {
                let sx = (x * src_w / dst_w).min(src_w - 1);
                let sy = (y * src_h / dst_h).min(src_h - 1);
                pixels[(sy * src_w + sx) * 3 + channel] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn extract_landmarks(&self, outputs: &TVec<TValue>) -> Result<Vec<Landmark>> {
        let coords = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?
            .to_array_view::<f32>()
            .context("landmark tensor was not f32")?;
        let coords: Vec<f32> = coords.iter().copied().collect();
        let needed = self.landmark_count * 3;
        if coords.len() < needed {
            return Err(anyhow!(
                "model produced {} values, expected at least {}",
                coords.len(),
                needed
            ));
        }
        let (w, h) = (self.width as f32, self.height as f32);
        Ok(coords[..needed]
            .chunks_exact(3)
            .map(|xyz| Landmark {
                x: (xyz[0] / w).clamp(0.0, 1.0),
                y: (xyz[1] / h).clamp(0.0, 1.0),
                z: xyz[2] / w,
            })
            .collect())
    }

    fn extract_presence(&self, outputs: &TVec<TValue>) -> Result<f32> {
        let Some(output) = outputs.get(1) else {
            return Ok(1.0);
        };
        let scores = output
            .to_array_view::<f32>()
            .context("presence tensor was not f32")?;
        let logit = scores.iter().copied().next().unwrap_or(f32::NEG_INFINITY);
        let score = 1.0 / (1.0 + (-logit).exp());
        if score.is_finite() {
            Ok(score)
        } else {
            Ok(0.0)
        }
    }
}

impl LandmarkDetector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let presence = self.extract_presence(&outputs)?;
        if presence < self.confidence_threshold {
            return Ok(None);
        }
        let points = self.extract_landmarks(&outputs)?;
        Ok(Some(LandmarkSet::new(points, presence)))
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::solid(self.width, self.height, [0, 0, 0]);
        self.detect(&blank).map(|_| ())
    }
}
