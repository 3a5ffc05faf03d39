//! Preprocessor trait and related types

use crate::error::PreprocessorError;
use crate::parameter::PreprocessorParameter;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Core preprocessor trait - every control-image preprocessor implements this
///
/// Calls are synchronous and block the caller until the control image is ready.
pub trait Preprocessor: Send + Sync {
    /// Static description: identity, tags and slider layout
    fn descriptor(&self) -> &PreprocessorDescriptor;

    /// Unique preprocessor identifier
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Turn `input` into a control image
    fn process(
        &self,
        input: &RgbImage,
        args: &PreprocessorArgs,
    ) -> Result<RgbImage, PreprocessorError>;

    /// Release any model held on an accelerator
    fn unload(&self) -> Result<(), PreprocessorError> {
        Ok(())
    }
}

/// Identity and UI layout of a preprocessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorDescriptor {
    /// Preprocessor name shown in the module list
    pub name: String,

    /// Capability tags (e.g. "Depth")
    pub tags: Vec<String>,

    pub slider_resolution: PreprocessorParameter,
    pub slider_1: Option<PreprocessorParameter>,
    pub slider_2: Option<PreprocessorParameter>,
    pub slider_3: Option<PreprocessorParameter>,

    /// Whether the UI offers the control-mode selector
    pub show_control_mode: bool,

    /// True for preprocessors that only pass pixels through
    pub do_not_need_model: bool,

    /// Higher goes to the top of the list
    pub sorting_priority: i32,
}

impl PreprocessorDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            slider_resolution: PreprocessorParameter::new("Resolution", 64.0, 2048.0, 512.0, 8.0),
            slider_1: None,
            slider_2: None,
            slider_3: None,
            show_control_mode: true,
            do_not_need_model: false,
            sorting_priority: 0,
        }
    }

    /// Arguments populated with every slider's default value
    pub fn default_args(&self) -> PreprocessorArgs {
        PreprocessorArgs {
            resolution: self.slider_resolution.value as u32,
            slider_1: self.slider_1.as_ref().map(|p| p.value),
            slider_2: self.slider_2.as_ref().map(|p| p.value),
            slider_3: self.slider_3.as_ref().map(|p| p.value),
        }
    }
}

/// Per-call slider values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorArgs {
    pub resolution: u32,
    pub slider_1: Option<f32>,
    pub slider_2: Option<f32>,
    pub slider_3: Option<f32>,
}

impl PreprocessorArgs {
    pub fn new(resolution: u32) -> Self {
        Self {
            resolution,
            slider_1: None,
            slider_2: None,
            slider_3: None,
        }
    }

    pub fn with_slider_1(mut self, value: f32) -> Self {
        self.slider_1 = Some(value);
        self
    }
}
