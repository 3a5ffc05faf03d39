//! `depth_marigold` preprocessor

use crate::config::{MarigoldConfig, ModelResidency};
use crate::onnx::OnnxPipelineLoader;
use crate::pipeline::{DepthPipeline, PipelineLoader};
use crate::tensor::{depth_to_rgb, numpy_to_pytorch, to_model_input};
use image::imageops::{self, FilterType};
use image::RgbImage;
use once_cell::sync::OnceCell;
use preprocessor_core::{
    resize_image_with_pad, Device, DeviceResolver, Preprocessor, PreprocessorArgs,
    PreprocessorDescriptor, PreprocessorError, PreprocessorParameter,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Registered preprocessor name
pub const PREPROCESSOR_NAME: &str = "depth_marigold";

/// Task name used when asking the host for a compute device
pub const DEVICE_TASK: &str = "controlnet";

type SharedPipeline = Mutex<Box<dyn DepthPipeline>>;

/// Marigold depth preprocessor with a lazily constructed, cached pipeline
pub struct PreprocessorMarigold {
    descriptor: PreprocessorDescriptor,
    config: MarigoldConfig,
    device: Device,
    loader: Arc<dyn PipelineLoader>,
    /// Pipeline handle - constructed on first load, only its device changes afterwards
    cached_pipeline: OnceCell<SharedPipeline>,
}

impl PreprocessorMarigold {
    /// Create the preprocessor with the default ONNX pipeline
    ///
    /// With no explicit `device` the host resolver picks the device for the
    /// ControlNet extension; passing any device pins the model to the CPU.
    pub fn new(devices: &dyn DeviceResolver, device: Option<Device>) -> Self {
        Self::with_config(MarigoldConfig::default(), devices, device)
    }

    pub fn with_config(
        config: MarigoldConfig,
        devices: &dyn DeviceResolver,
        device: Option<Device>,
    ) -> Self {
        Self::with_loader(config, devices, device, Arc::new(OnnxPipelineLoader))
    }

    pub fn with_loader(
        config: MarigoldConfig,
        devices: &dyn DeviceResolver,
        device: Option<Device>,
        loader: Arc<dyn PipelineLoader>,
    ) -> Self {
        let device = match device {
            None => devices.device_for(DEVICE_TASK),
            Some(_) => Device::Cpu,
        };

        let mut descriptor = PreprocessorDescriptor::new(PREPROCESSOR_NAME);
        descriptor.tags = vec!["Depth".to_string()];
        descriptor.slider_resolution =
            PreprocessorParameter::new("Resolution", 128.0, 2048.0, 768.0, 8.0);
        descriptor.slider_1 = Some(PreprocessorParameter::new("Steps", 1.0, 50.0, 20.0, 1.0));
        descriptor.show_control_mode = true;
        descriptor.do_not_need_model = false;
        descriptor.sorting_priority = 100;

        debug!("{} will run on {}", PREPROCESSOR_NAME, device);

        Self {
            descriptor,
            config,
            device,
            loader,
            cached_pipeline: OnceCell::new(),
        }
    }

    /// Load the preprocessor configuration from YAML
    pub fn from_yaml(
        yaml_path: impl AsRef<Path>,
        devices: &dyn DeviceResolver,
        device: Option<Device>,
    ) -> Result<Self, PreprocessorError> {
        let config = MarigoldConfig::from_yaml(yaml_path)?;
        Ok(Self::with_config(config, devices, device))
    }

    /// Device the model runs on during inference
    pub fn device(&self) -> Device {
        self.device
    }

    pub fn config(&self) -> &MarigoldConfig {
        &self.config
    }

    /// Device the model currently sits on, `None` before the first load
    pub fn model_device(&self) -> Option<Device> {
        let pipeline = self.cached_pipeline.get()?;
        Self::lock(pipeline).ok().map(|p| p.device())
    }

    /// Construct the pipeline if needed and move it to the compute device
    pub fn load_model(&self) -> Result<Device, PreprocessorError> {
        let mut pipeline = Self::lock(self.get_or_load_pipeline()?)?;
        self.place(&mut **pipeline, self.device)?;
        Ok(pipeline.device())
    }

    /// Move the pipeline back to the CPU
    pub fn unload_model(&self) -> Result<(), PreprocessorError> {
        let pipeline = self.cached_pipeline.get().ok_or_else(|| {
            PreprocessorError::ModelNotLoaded(format!(
                "{} has no pipeline to unload",
                PREPROCESSOR_NAME
            ))
        })?;
        let mut pipeline = Self::lock(pipeline)?;
        self.place(&mut **pipeline, Device::Cpu)
    }

    /// Get or construct the pipeline (constructed once, then cached)
    fn get_or_load_pipeline(&self) -> Result<&SharedPipeline, PreprocessorError> {
        self.cached_pipeline.get_or_try_init(|| {
            info!(
                "Loading Marigold pipeline from {} (first time only)",
                self.config.pretrained.pretrained_path
            );
            let pipeline = self
                .loader
                .from_pretrained(&self.config.pretrained)
                .map_err(|e| PreprocessorError::ModelLoad(e.to_string()))?;
            info!("Marigold pipeline loaded and cached for reuse");
            Ok(Mutex::new(pipeline))
        })
    }

    fn lock(
        pipeline: &SharedPipeline,
    ) -> Result<MutexGuard<'_, Box<dyn DepthPipeline>>, PreprocessorError> {
        pipeline.lock().map_err(|e| {
            PreprocessorError::Inference(format!("Failed to lock pipeline mutex: {}", e))
        })
    }

    fn place(
        &self,
        pipeline: &mut dyn DepthPipeline,
        device: Device,
    ) -> Result<(), PreprocessorError> {
        pipeline.to_device(device).map_err(|e| {
            PreprocessorError::ModelLoad(format!("Failed to move pipeline to {}: {}", device, e))
        })
    }

    fn steps(&self, args: &PreprocessorArgs) -> u32 {
        match args.slider_1 {
            Some(steps) => steps.round().max(1.0) as u32,
            None => self
                .descriptor
                .slider_1
                .as_ref()
                .map(|p| p.value as u32)
                .unwrap_or(1),
        }
    }

    /// Run the pipeline on a padded image and return the padded-size RGB depth image
    fn estimate(
        pipeline: &mut dyn DepthPipeline,
        padded: &RgbImage,
        steps: u32,
    ) -> Result<RgbImage, PreprocessorError> {
        let input = to_model_input(numpy_to_pytorch(padded)?);
        debug!("Model input {:?} on {}", input.shape(), pipeline.device());

        let depth = pipeline.infer(input.view(), steps, false)?;
        let depth_image = depth_to_rgb(&depth)?;

        let size = padded.dimensions();
        if depth_image.dimensions() != size {
            debug!(
                "Resizing depth {:?} to padded input {:?}",
                depth_image.dimensions(),
                size
            );
            return Ok(imageops::resize(
                &depth_image,
                size.0,
                size.1,
                FilterType::CatmullRom,
            ));
        }

        Ok(depth_image)
    }
}

impl Preprocessor for PreprocessorMarigold {
    fn descriptor(&self) -> &PreprocessorDescriptor {
        &self.descriptor
    }

    fn process(
        &self,
        input: &RgbImage,
        args: &PreprocessorArgs,
    ) -> Result<RgbImage, PreprocessorError> {
        let start = Instant::now();
        let (padded, remover) = resize_image_with_pad(input, args.resolution)?;
        let steps = self.steps(args);

        // The lock is held for the whole call so concurrent callers cannot move
        // the pipeline while another one is running inference.
        let mut pipeline = Self::lock(self.get_or_load_pipeline()?)?;
        self.place(&mut **pipeline, self.device)?;

        let result = Self::estimate(&mut **pipeline, &padded, steps);

        if self.config.residency == ModelResidency::LoadPerCall {
            let unloaded = self.place(&mut **pipeline, Device::Cpu);
            if let Err(e) = &unloaded {
                warn!("Failed to unload Marigold pipeline: {}", e);
            }
            if result.is_ok() {
                unloaded?;
            }
        }
        drop(pipeline);

        let depth_image = result?;
        let output = remover.remove_pad(&depth_image)?;

        debug!(
            "{} finished in {:?}: {}x{} ({} steps)",
            PREPROCESSOR_NAME,
            start.elapsed(),
            output.width(),
            output.height(),
            steps
        );

        Ok(output)
    }

    fn unload(&self) -> Result<(), PreprocessorError> {
        if self.cached_pipeline.get().is_none() {
            return Ok(());
        }
        self.unload_model()
    }
}
