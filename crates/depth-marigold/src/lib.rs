//! Marigold depth preprocessor for ControlNet
//!
//! Wraps a diffusion-based monocular depth pipeline (Marigold) as the
//! `depth_marigold` preprocessor. The adapter pads and resizes the input,
//! normalizes it to a `[-1, 1]` NCHW tensor, runs the pipeline for the
//! requested number of denoising steps and expands the single-channel depth
//! estimate back into an RGB control image of the input's size.
//!
//! The pipeline itself sits behind [`DepthPipeline`]; the default
//! [`OnnxPipelineLoader`] runs an exported ONNX graph through ONNX Runtime
//! and fetches the weights from the Hugging Face hub when no local copy is
//! configured.
//!
//! # Example
//! ```no_run
//! use depth_marigold::PreprocessorMarigold;
//! use preprocessor_core::{HostDevices, Preprocessor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let marigold = PreprocessorMarigold::new(&HostDevices::from_env(), None);
//!
//! let img = image::open("photo.jpg")?.to_rgb8();
//! let args = marigold.descriptor().default_args();
//! let depth = marigold.process(&img, &args)?;
//!
//! println!("Depth map size: {}x{}", depth.width(), depth.height());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod onnx;
pub mod pipeline;
pub mod plugin;
pub mod tensor;

pub use config::{MarigoldConfig, ModelResidency, NoiseScheduler, PretrainedOptions};
pub use onnx::{OnnxMarigoldPipeline, OnnxPipelineLoader};
pub use pipeline::{DepthPipeline, PipelineLoader};
pub use plugin::{PreprocessorMarigold, DEVICE_TASK, PREPROCESSOR_NAME};

use preprocessor_core::PreprocessorError;
use thiserror::Error;

/// Errors that can occur while loading or running the depth pipeline
#[derive(Error, Debug)]
pub enum MarigoldError {
    #[error("ONNX Runtime error: {0}")]
    OrtError(#[from] ort::Error),

    #[error("Failed to create inference session: {0}")]
    Session(String),

    #[error("Failed to fetch pretrained model {model_id}: {error}")]
    Fetch { model_id: String, error: String },

    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid depth shape: expected [1, H, W] or [1, 1, H, W], got {0:?}")]
    InvalidOutputShape(Vec<i64>),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MarigoldError> for PreprocessorError {
    fn from(err: MarigoldError) -> Self {
        match err {
            MarigoldError::Fetch { .. }
            | MarigoldError::ModelNotFound(_)
            | MarigoldError::Session(_)
            | MarigoldError::InvalidConfig(_) => PreprocessorError::ModelLoad(err.to_string()),
            MarigoldError::Io(e) => PreprocessorError::Io(e),
            MarigoldError::OrtError(_)
            | MarigoldError::InvalidOutputShape(_)
            | MarigoldError::Shape(_) => PreprocessorError::Inference(err.to_string()),
        }
    }
}
