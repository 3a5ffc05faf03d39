//! ControlNet Preprocessors
//!
//! Wires the built-in preprocessors into a [`PreprocessorRegistry`]. Hosts
//! call [`register_builtin_preprocessors`] (or [`builtin_registry`]) once at
//! process start; no preprocessor registers itself as a side effect.

pub use depth_marigold;
pub use preprocessor_core;

use depth_marigold::PreprocessorMarigold;
use preprocessor_core::{DeviceResolver, HostDevices, PreprocessorRegistry};
use std::sync::Arc;
use tracing::info;

/// Register every built-in preprocessor with its default configuration
pub fn register_builtin_preprocessors(
    registry: &mut PreprocessorRegistry,
    devices: &dyn DeviceResolver,
) {
    registry.register(Arc::new(PreprocessorMarigold::new(devices, None)));

    info!("{} preprocessors registered", registry.len());
}

/// Registry holding every built-in preprocessor, devices taken from the environment
pub fn builtin_registry() -> PreprocessorRegistry {
    let mut registry = PreprocessorRegistry::new();
    register_builtin_preprocessors(&mut registry, &HostDevices::from_env());
    registry
}
