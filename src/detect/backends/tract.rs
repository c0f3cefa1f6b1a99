#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::InferenceBackend;
use crate::detect::result::RawDetection;
use crate::detect::ssd;
use crate::ingest::Frame;

/// Per-channel mean subtracted from BGR input, as the Res10 SSD expects.
const MEAN_BGR: [f32; 3] = [104.0, 177.0, 123.0];

/// Tract-based backend for SSD face detectors exported to ONNX.
///
/// Frames are resized to the model input geometry, converted to BGR with the
/// mean subtracted, and the `[1, 1, N, 7]` output is decoded into normalized
/// detections.
pub struct TractBackend {
    model: Option<SimplePlan<TypedFact, Box<dyn TypedOp>>>,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
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

        log::info!(
            "TractBackend: loaded {} (input {}x{})",
            model_path.display(),
            width,
            height
        );
        Ok(Self {
            model: Some(model),
            width,
            height,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let rgb = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
        let resized = if rgb.dimensions() == (self.width, self.height) {
            rgb
        } else {
            image::imageops::resize(&rgb, self.width, self.height, FilterType::Triangle)
        };

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| {
                let pixel = resized.get_pixel(x as u32, y as u32);
                // channel 0 is blue
                pixel[2 - channel] as f32 - MEAN_BGR[channel]
            },
        );
        Ok(input.into_tensor())
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame)?;
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("tract backend is closed"))?;
        let outputs = model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let flat: Vec<f32> = view.iter().copied().collect();
        ssd::decode_rows(&flat)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::new(
            vec![0; self.width as usize * self.height as usize * 3],
            self.width,
            self.height,
        )?;
        self.infer(&blank).map(|_| ())
    }

    fn close(&mut self) {
        self.model = None;
    }
}
