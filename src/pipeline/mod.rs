//! Image processing pipeline: source bytes in, device pixel buffer out.
//!
//! Quantization over a 1200x1600 panel is CPU-heavy, so jobs run on the
//! blocking pool behind a small semaphore; device pollers are never starved
//! by concurrent uploads.

mod ops;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::models::Rotation;
use spectra_dither::DitherAlgorithm;

/// Thumbnail bounding box (portrait).
pub const THUMB_WIDTH: u32 = 300;
pub const THUMB_HEIGHT: u32 = 400;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unrecognized or undecodable image: {0}")]
    Decode(String),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("crop region is empty")]
    Degenerate,

    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Parameters for one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub rotation: Rotation,
    /// Horizontal crop anchor in percent of source width.
    pub crop_x: f32,
    /// Vertical crop anchor in percent of source height.
    pub crop_y: f32,
    /// Magnification; 1.0 shows the full fitted frame.
    pub zoom_level: f32,
    pub dither: DitherAlgorithm,
    pub enhance_contrast: bool,
    pub sharpen: bool,
    pub auto_crop_whitespace: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg0,
            crop_x: 50.0,
            crop_y: 50.0,
            zoom_level: 1.0,
            dither: DitherAlgorithm::FloydSteinberg,
            enhance_contrast: false,
            sharpen: false,
            auto_crop_whitespace: false,
        }
    }
}

impl ProcessOptions {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.zoom_level < 1.0 {
            return Err(PipelineError::InvalidParam(format!(
                "zoomLevel must be >= 1.0, got {}",
                self.zoom_level
            )));
        }
        if !(0.0..=100.0).contains(&self.crop_x) || !(0.0..=100.0).contains(&self.crop_y) {
            return Err(PipelineError::InvalidParam(
                "crop anchors must be between 0 and 100".into(),
            ));
        }
        Ok(())
    }
}

/// The result of a pipeline run: a device-ready buffer plus a PNG
/// thumbnail of the quantized output.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// RGB888, `width * height * 3` bytes, every triple a palette color.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub thumbnail_png: Vec<u8>,
}

/// Bounded worker pool around the blocking processing steps.
pub struct ImagePipeline {
    jobs: Arc<Semaphore>,
}

impl ImagePipeline {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            jobs: Arc::new(Semaphore::new(max_jobs.max(1))),
        }
    }

    /// Process source bytes into a device buffer. Waits for a worker slot,
    /// then runs on the blocking pool. Deterministic: identical inputs and
    /// options produce byte-identical buffers.
    pub async fn process(
        &self,
        bytes: Vec<u8>,
        options: ProcessOptions,
    ) -> Result<ProcessedImage, PipelineError> {
        options.validate()?;
        let permit = self
            .jobs
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            ops::run(&bytes, &options)
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))?
    }

    /// Synchronous entry point for the CLI and tests.
    pub fn process_sync(
        bytes: &[u8],
        options: &ProcessOptions,
    ) -> Result<ProcessedImage, PipelineError> {
        options.validate()?;
        ops::run(bytes, options)
    }
}
