//! Configuration for the Marigold preprocessor

use crate::MarigoldError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hugging Face repository holding the pretrained Marigold weights
pub const DEFAULT_PRETRAINED_PATH: &str = "Bingxin/Marigold";

/// Exported pipeline graph inside the pretrained repository
pub const DEFAULT_MODEL_FILE: &str = "marigold.onnx";

/// Noise scheduler the pipeline samples with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoiseScheduler {
    #[default]
    #[serde(rename = "DDIMScheduler")]
    Ddim,
}

/// Where the model lives between calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelResidency {
    /// Move the model back to the CPU after every call
    #[default]
    LoadPerCall,

    /// Leave the model on its compute device between calls
    KeepResident,
}

/// Arguments used to construct the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PretrainedOptions {
    /// Hub repository id, or a local directory containing `model_file`
    pub pretrained_path: String,

    pub model_file: String,

    pub noise_scheduler_type: NoiseScheduler,

    /// Memory-efficient attention kernels
    pub enable_xformers: bool,

    /// Explicit model file, bypassing `pretrained_path`
    pub local_model_path: Option<PathBuf>,
}

impl Default for PretrainedOptions {
    fn default() -> Self {
        Self {
            pretrained_path: DEFAULT_PRETRAINED_PATH.to_string(),
            model_file: DEFAULT_MODEL_FILE.to_string(),
            noise_scheduler_type: NoiseScheduler::Ddim,
            enable_xformers: false,
            local_model_path: None,
        }
    }
}

/// Configuration for the Marigold preprocessor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarigoldConfig {
    pub pretrained: PretrainedOptions,
    pub residency: ModelResidency,
}

impl MarigoldConfig {
    /// Load configuration from a YAML file; missing keys keep their defaults
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, MarigoldError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        serde_yaml::from_str(&contents)
            .map_err(|e| MarigoldError::InvalidConfig(format!("Failed to parse YAML: {}", e)))
    }
}
