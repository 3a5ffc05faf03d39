//! ControlNet Preprocess CLI
//!
//! Command-line front end for the built-in ControlNet preprocessors.

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use controlnet_preprocessors::builtin_registry;
use depth_marigold::{MarigoldConfig, ModelResidency, PreprocessorMarigold, PREPROCESSOR_NAME};
use preprocessor_core::{HostDevices, Preprocessor, PreprocessorArgs, PreprocessorRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "controlnet-preprocess",
    version,
    about = "Turn images into ControlNet control maps",
    after_help = "EXAMPLES:\n  \
                  # List available preprocessors\n  \
                  controlnet-preprocess list\n\n  \
                  # Marigold depth at the default resolution and step count\n  \
                  controlnet-preprocess run --input photo.jpg --output depth.png\n\n  \
                  # Fewer denoising steps, model kept on the accelerator\n  \
                  controlnet-preprocess run -i photo.jpg -o depth.png --steps 10 --keep-resident\n\n\
                  Devices come from CONTROLNET_DEVICE (cpu, cuda, cuda:N, coreml) and\n\
                  CONTROLNET_USE_CPU (comma separated tasks, or `all`)."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered preprocessors
    List,

    /// Run a preprocessor on one image
    Run(RunCommand),
}

#[derive(Args)]
struct RunCommand {
    /// Preprocessor name
    #[arg(short, long, default_value = PREPROCESSOR_NAME)]
    module: String,

    /// Input image
    #[arg(short, long)]
    input: PathBuf,

    /// Output image (format from extension)
    #[arg(short, long)]
    output: PathBuf,

    /// Processing resolution (defaults to the preprocessor's slider default)
    #[arg(long)]
    resolution: Option<u32>,

    /// Denoising steps for depth_marigold
    #[arg(long)]
    steps: Option<f32>,

    /// YAML configuration for depth_marigold
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep the model on the accelerator after the call
    #[arg(long)]
    keep_resident: bool,
}

impl RunCommand {
    fn registry(&self) -> Result<PreprocessorRegistry> {
        let mut registry = builtin_registry();

        if self.config.is_some() || self.keep_resident {
            let mut config = match &self.config {
                Some(path) => MarigoldConfig::from_yaml(path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => MarigoldConfig::default(),
            };
            if self.keep_resident {
                config.residency = ModelResidency::KeepResident;
            }
            let devices = HostDevices::from_env();
            registry.register(Arc::new(PreprocessorMarigold::with_config(
                config, &devices, None,
            )));
        }

        Ok(registry)
    }

    fn execute(&self) -> Result<()> {
        let registry = self.registry()?;
        let preprocessor = registry.get(&self.module)?;
        let descriptor = preprocessor.descriptor();

        let mut args = descriptor.default_args();
        if let Some(resolution) = self.resolution {
            args.resolution = descriptor.slider_resolution.validate(resolution as f32)? as u32;
        }
        if let Some(steps) = self.steps {
            let slider = descriptor.slider_1.as_ref().with_context(|| {
                format!("{} does not take a steps value", descriptor.name)
            })?;
            args.slider_1 = Some(slider.validate(steps)?);
        }

        let image = image::open(&self.input)
            .with_context(|| format!("Failed to open {}", self.input.display()))?
            .to_rgb8();

        info!(
            "Running {} on {} ({}x{}, resolution {})",
            descriptor.name,
            self.input.display(),
            image.width(),
            image.height(),
            args.resolution
        );

        let start = Instant::now();
        let result = process(preprocessor.as_ref(), &image, &args);
        registry.unload_all()?;
        let control = result?;

        control
            .save(&self.output)
            .with_context(|| format!("Failed to write {}", self.output.display()))?;

        info!(
            "Wrote {} in {:.2}s",
            self.output.display(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

fn process(
    preprocessor: &dyn Preprocessor,
    image: &image::RgbImage,
    args: &PreprocessorArgs,
) -> Result<image::RgbImage> {
    preprocessor
        .process(image, args)
        .with_context(|| format!("{} failed", preprocessor.name()))
}

fn list_preprocessors() -> Result<()> {
    let registry = builtin_registry();
    for name in registry.names() {
        let descriptor = registry.get(&name)?.descriptor().clone();
        println!(
            "{:<24} tags: [{}]  priority: {}",
            descriptor.name,
            descriptor.tags.join(", "),
            descriptor.sorting_priority
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging (quiet for list to keep the output clean)
    let log_level = match &cli.command {
        Commands::List => Level::WARN,
        _ => {
            if cli.verbose {
                Level::DEBUG
            } else {
                Level::INFO
            }
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match &cli.command {
        Commands::List => list_preprocessors(),
        Commands::Run(cmd) => cmd.execute(),
    }
}
