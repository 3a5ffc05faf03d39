//! ONNX Runtime backed Marigold pipeline
//!
//! The exported graph takes the normalized image and the number of denoising
//! steps and returns the ensembled depth estimate, so the whole sampling loop
//! runs inside ONNX Runtime. Model bytes stay in host memory for the lifetime
//! of the pipeline; a session for the current device is created on first use
//! and dropped whenever the pipeline moves to another device.

use crate::config::PretrainedOptions;
use crate::pipeline::{DepthPipeline, PipelineLoader};
use crate::MarigoldError;
use hf_hub::api::sync::ApiBuilder;
use ndarray::{Array1, Array4, ArrayView4};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use preprocessor_core::Device;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Graph input holding the `[1, 3, H, W]` image
pub const INPUT_IMAGE: &str = "image";

/// Graph input holding the `[1]` step count
pub const INPUT_STEPS: &str = "num_inference_steps";

/// Loads [`OnnxMarigoldPipeline`]s from a local file or the Hugging Face hub
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxPipelineLoader;

impl PipelineLoader for OnnxPipelineLoader {
    fn from_pretrained(
        &self,
        options: &PretrainedOptions,
    ) -> Result<Box<dyn DepthPipeline>, MarigoldError> {
        let model_path = resolve_model_file(options)?;
        Ok(Box::new(OnnxMarigoldPipeline::from_file(&model_path, options)?))
    }
}

/// Find the model file: explicit path, local directory, then the hub
pub fn resolve_model_file(options: &PretrainedOptions) -> Result<PathBuf, MarigoldError> {
    if let Some(path) = &options.local_model_path {
        if !path.exists() {
            return Err(MarigoldError::ModelNotFound(path.display().to_string()));
        }
        return Ok(path.clone());
    }

    let local_dir = Path::new(&options.pretrained_path);
    if local_dir.is_dir() {
        let path = local_dir.join(&options.model_file);
        if !path.exists() {
            return Err(MarigoldError::ModelNotFound(path.display().to_string()));
        }
        return Ok(path);
    }

    fetch_from_hub(&options.pretrained_path, &options.model_file)
}

fn fetch_from_hub(model_id: &str, file: &str) -> Result<PathBuf, MarigoldError> {
    let fetch_error = |e: hf_hub::api::sync::ApiError| MarigoldError::Fetch {
        model_id: model_id.to_string(),
        error: e.to_string(),
    };

    let api = ApiBuilder::new()
        .with_progress(false)
        .build()
        .map_err(fetch_error)?;

    info!("Downloading {} from {}", file, model_id);
    api.model(model_id.to_string())
        .get(file)
        .map_err(fetch_error)
}

/// Spatial size of a `[1, H, W]` or `[1, 1, H, W]` depth output
fn depth_dims(shape: &[i64]) -> Result<(usize, usize), MarigoldError> {
    let (height, width) = match shape {
        [1, h, w] | [1, 1, h, w] => (*h, *w),
        _ => return Err(MarigoldError::InvalidOutputShape(shape.to_vec())),
    };
    if height <= 0 || width <= 0 {
        return Err(MarigoldError::InvalidOutputShape(shape.to_vec()));
    }
    Ok((height as usize, width as usize))
}

fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    match device {
        Device::Cpu => vec![CPUExecutionProvider::default().build()],
        Device::Cuda(id) => vec![
            CUDAExecutionProvider::default().with_device_id(id).build(),
            CPUExecutionProvider::default().build(),
        ],
        Device::CoreMl => vec![
            CoreMLExecutionProvider::default().with_subgraphs(true).build(),
            CPUExecutionProvider::default().build(),
        ],
    }
}

fn create_session(model: &[u8], device: Device) -> Result<Session, MarigoldError> {
    Session::builder()
        .map_err(|e| MarigoldError::Session(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MarigoldError::Session(e.to_string()))?
        .with_memory_pattern(true)
        .map_err(|e| MarigoldError::Session(e.to_string()))?
        .with_execution_providers(execution_providers(device))
        .map_err(|e| MarigoldError::Session(e.to_string()))?
        .commit_from_memory(model)
        .map_err(|e| MarigoldError::Session(e.to_string()))
}

/// Marigold depth pipeline exported to a single ONNX graph
pub struct OnnxMarigoldPipeline {
    /// Serialized graph and weights, always resident in host memory
    model: Vec<u8>,
    device: Device,
    /// Session for `device`, created on first inference
    session: Option<Session>,
}

impl OnnxMarigoldPipeline {
    /// Read the model into host memory; the pipeline starts on the CPU
    pub fn from_file(model_path: &Path, options: &PretrainedOptions) -> Result<Self, MarigoldError> {
        info!("Loading Marigold depth model from {}", model_path.display());

        if options.enable_xformers {
            warn!("Memory-efficient attention is not available for ONNX models; ignoring");
        }
        debug!(
            "Noise scheduler: {:?} (baked into the exported graph)",
            options.noise_scheduler_type
        );

        let model = std::fs::read(model_path)?;

        debug!("Marigold model read ({} bytes)", model.len());

        Ok(Self {
            model,
            device: Device::Cpu,
            session: None,
        })
    }
}

impl DepthPipeline for OnnxMarigoldPipeline {
    fn device(&self) -> Device {
        self.device
    }

    fn to_device(&mut self, device: Device) -> Result<(), MarigoldError> {
        if device != self.device {
            debug!("Moving Marigold pipeline {} -> {}", self.device, device);
            self.session = None;
            self.device = device;
        }
        Ok(())
    }

    fn infer(
        &mut self,
        image: ArrayView4<'_, f32>,
        num_inference_steps: u32,
        show_progress: bool,
    ) -> Result<Array4<f32>, MarigoldError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let start = Instant::now();
                let session = create_session(&self.model, self.device)?;
                info!(
                    "Created Marigold session on {} in {:.3}s",
                    self.device,
                    start.elapsed().as_secs_f64()
                );
                session
            }
        };
        let session = self.session.insert(session);

        if show_progress {
            info!(
                "Running Marigold ({} denoising steps) on {}x{}",
                num_inference_steps,
                image.shape()[3],
                image.shape()[2]
            );
        } else {
            debug!(
                "Running Marigold ({} denoising steps) on {:?}",
                num_inference_steps,
                image.shape()
            );
        }

        let image = image.as_standard_layout().into_owned();
        let steps = Array1::from_elem(1, num_inference_steps as i64);

        let image_tensor = TensorRef::from_array_view(image.view())?;
        let steps_tensor = TensorRef::from_array_view(steps.view())?;

        // Extract output name BEFORE running inference to avoid borrow conflicts
        let output_name = session.outputs[0].name.clone();

        let start = Instant::now();
        let outputs = session.run(ort::inputs![
            INPUT_IMAGE => image_tensor,
            INPUT_STEPS => steps_tensor
        ])?;

        let (shape, depth_data) = outputs[output_name.as_str()].try_extract_tensor::<f32>()?;

        let (height, width) = depth_dims(shape)?;

        let depth = Array4::from_shape_vec((1, 1, height, width), depth_data.to_vec())?;

        if show_progress {
            info!("Marigold finished in {:.3}s", start.elapsed().as_secs_f64());
        }

        Ok(depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_local_model() {
        let options = PretrainedOptions {
            local_model_path: Some(PathBuf::from("nonexistent/marigold.onnx")),
            ..Default::default()
        };
        let result = OnnxPipelineLoader.from_pretrained(&options);
        assert!(matches!(result, Err(MarigoldError::ModelNotFound(_))));
    }

    #[test]
    fn test_depth_dims_accepts_single_channel_layouts() {
        assert_eq!(depth_dims(&[1, 1, 48, 64]).unwrap(), (48, 64));
        assert_eq!(depth_dims(&[1, 48, 64]).unwrap(), (48, 64));
    }

    #[test]
    fn test_depth_dims_rejects_other_layouts() {
        for shape in [
            vec![2, 1, 48, 64],
            vec![1, 3, 48, 64],
            vec![48, 64],
            vec![1, 1, 1, 48, 64],
            vec![1, -1, 64],
        ] {
            assert!(
                matches!(
                    depth_dims(&shape),
                    Err(MarigoldError::InvalidOutputShape(ref s)) if *s == shape
                ),
                "shape {shape:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_execution_providers_fall_back_to_cpu() {
        assert_eq!(execution_providers(Device::Cpu).len(), 1);
        assert_eq!(execution_providers(Device::Cuda(1)).len(), 2);
        assert_eq!(execution_providers(Device::CoreMl).len(), 2);
    }
}
