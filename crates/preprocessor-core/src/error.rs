//! Error types for the preprocessor system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid value {value} for parameter '{label}': {reason}")]
    InvalidParameter {
        label: String,
        value: f32,
        reason: String,
    },

    #[error("Model is not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No preprocessor registered under name: {0}")]
    NotFound(String),

    #[error("Preprocessor error: {0}")]
    Preprocessor(#[from] PreprocessorError),
}
