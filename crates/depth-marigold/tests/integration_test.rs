//! Integration tests for the Marigold depth preprocessor

use depth_marigold::onnx::resolve_model_file;
use depth_marigold::{
    DepthPipeline, MarigoldConfig, MarigoldError, ModelResidency, OnnxPipelineLoader,
    PipelineLoader, PreprocessorMarigold, PretrainedOptions,
};
use preprocessor_core::{Device, HostDevices, Preprocessor, PreprocessorError};
use std::fs;

#[test]
fn test_config_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("marigold.yaml");
    fs::write(
        &path,
        "residency: keep_resident\npretrained:\n  pretrained_path: /opt/models/marigold\n",
    )
    .unwrap();

    let config = MarigoldConfig::from_yaml(&path).unwrap();
    assert_eq!(config.residency, ModelResidency::KeepResident);
    assert_eq!(config.pretrained.pretrained_path, "/opt/models/marigold");
    assert!(!config.pretrained.enable_xformers);
}

#[test]
fn test_preprocessor_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("marigold.yaml");
    fs::write(&path, "residency: load_per_call\n").unwrap();

    let devices = HostDevices::new(Device::CoreMl);
    let marigold = PreprocessorMarigold::from_yaml(&path, &devices, None).unwrap();

    assert_eq!(marigold.name(), "depth_marigold");
    assert_eq!(marigold.device(), Device::CoreMl);
    assert_eq!(marigold.config().residency, ModelResidency::LoadPerCall);
}

#[test]
fn test_invalid_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "residency: [unterminated\n").unwrap();

    assert!(matches!(
        MarigoldConfig::from_yaml(&path),
        Err(MarigoldError::InvalidConfig(_))
    ));

    let devices = HostDevices::default();
    assert!(matches!(
        PreprocessorMarigold::from_yaml(dir.path().join("missing.yaml"), &devices, None),
        Err(PreprocessorError::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound
    ));
}

#[test]
fn test_resolve_model_from_local_directory() {
    let dir = tempfile::tempdir().unwrap();
    let options = PretrainedOptions {
        pretrained_path: dir.path().display().to_string(),
        ..Default::default()
    };

    assert!(matches!(
        resolve_model_file(&options),
        Err(MarigoldError::ModelNotFound(_))
    ));

    let model = dir.path().join("marigold.onnx");
    fs::write(&model, b"onnx").unwrap();
    assert_eq!(resolve_model_file(&options).unwrap(), model);
}

#[test]
fn test_onnx_pipeline_starts_on_cpu_and_moves() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("depth.onnx");
    fs::write(&model, b"onnx").unwrap();

    let options = PretrainedOptions {
        local_model_path: Some(model),
        ..Default::default()
    };
    let mut pipeline = OnnxPipelineLoader.from_pretrained(&options).unwrap();

    assert_eq!(pipeline.device(), Device::Cpu);
    pipeline.to_device(Device::Cuda(0)).unwrap();
    assert_eq!(pipeline.device(), Device::Cuda(0));
    pipeline.to_device(Device::Cpu).unwrap();
    assert_eq!(pipeline.device(), Device::Cpu);
}

#[test]
fn test_missing_model_surfaces_as_load_error() {
    let config = MarigoldConfig {
        pretrained: PretrainedOptions {
            local_model_path: Some("does/not/exist.onnx".into()),
            ..Default::default()
        },
        ..Default::default()
    };
    let marigold = PreprocessorMarigold::with_config(config, &HostDevices::default(), None);

    assert!(matches!(
        marigold.load_model(),
        Err(PreprocessorError::ModelLoad(_))
    ));
    assert!(marigold.model_device().is_none());
}
