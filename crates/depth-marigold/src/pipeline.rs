//! Depth pipeline seam
//!
//! The diffusion sampling loop lives behind these traits. The preprocessor
//! only moves the pipeline between devices and feeds it normalized tensors.

use crate::config::PretrainedOptions;
use crate::MarigoldError;
use ndarray::{Array4, ArrayView4};
use preprocessor_core::Device;

/// A loaded monocular depth pipeline
pub trait DepthPipeline: Send {
    /// Device the pipeline currently lives on
    fn device(&self) -> Device;

    /// Move the pipeline to `device`
    fn to_device(&mut self, device: Device) -> Result<(), MarigoldError>;

    /// Estimate depth for an NCHW `[1, 3, H, W]` image in `[-1, 1]`
    ///
    /// Returns `[1, 1, H, W]` depth in the pipeline's native `[-1, 1]` range.
    fn infer(
        &mut self,
        image: ArrayView4<'_, f32>,
        num_inference_steps: u32,
        show_progress: bool,
    ) -> Result<Array4<f32>, MarigoldError>;
}

/// Constructs pipelines from pretrained weights
pub trait PipelineLoader: Send + Sync {
    fn from_pretrained(
        &self,
        options: &PretrainedOptions,
    ) -> Result<Box<dyn DepthPipeline>, MarigoldError>;
}
