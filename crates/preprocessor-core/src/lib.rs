//! Preprocessor Core - host-side seams for ControlNet image preprocessors
//!
//! This crate provides the abstractions every preprocessor plugs into: the
//! [`Preprocessor`] trait with its slider descriptors, an explicit
//! [`PreprocessorRegistry`] populated at process init, compute-device
//! resolution, and the resize-with-pad helper shared by all preprocessors.

pub mod device;
pub mod error;
pub mod image_pad;
pub mod parameter;
pub mod preprocessor;
pub mod registry;

pub use device::{Device, DeviceResolver, HostDevices};
pub use error::{PreprocessorError, RegistryError};
pub use image_pad::{resize_image_with_pad, PadRemover};
pub use parameter::PreprocessorParameter;
pub use preprocessor::{Preprocessor, PreprocessorArgs, PreprocessorDescriptor};
pub use registry::PreprocessorRegistry;
