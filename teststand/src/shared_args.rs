use std::path::PathBuf;

use clap::Args;

use crate::config::TeststandConfig;
use crate::error::ConfigurationError;

/// Geometry and calibration overrides
#[derive(Args, Debug, Clone, Default)]
pub struct GeometryArgs {
    /// Layer widths in mm, innermost first (format: "window,oil,capsule")
    #[arg(long, value_delimiter = ',')]
    pub layer_widths: Option<Vec<f64>>,

    /// Photocathode quantum efficiency table (wavelength nm, efficiency %)
    #[arg(long)]
    pub qe_file: Option<PathBuf>,
}

/// Output artifact overrides
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Base output filename; the run index is inserted before the extension
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not write per-photon rows
    #[arg(long, default_value_t = false)]
    pub disable_photon_timestamps: bool,

    /// Do not write per-detector hit counts
    #[arg(long, default_value_t = false)]
    pub disable_integral_light: bool,
}

/// Event generation and scheduling
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Number of worker threads
    #[arg(short = 't', long)]
    pub nthreads: Option<usize>,

    /// Events per run
    #[arg(long, default_value_t = 10)]
    pub events: u32,

    /// Number of runs to execute back to back
    #[arg(long, default_value_t = 1)]
    pub runs: u32,

    /// Photons fired at the photocathode per event
    #[arg(long)]
    pub photons_per_event: Option<u32>,

    /// Seed for the photon gun
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Common arguments shared by test stand binaries
#[derive(Args, Debug, Clone)]
pub struct SharedTeststandArgs {
    /// JSON configuration file; built-in defaults when absent
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub run: RunArgs,
}

impl SharedTeststandArgs {
    /// Load the configuration file, if any, and apply command line overrides.
    pub fn resolve_config(&self) -> Result<TeststandConfig, ConfigurationError> {
        let mut config = match &self.config {
            Some(path) => TeststandConfig::load_from_file(path)?,
            None => TeststandConfig::default(),
        };

        if let Some(widths) = &self.geometry.layer_widths {
            config.set_layer_widths(widths)?;
        }
        if let Some(path) = &self.geometry.qe_file {
            config.calibration_path = path.clone();
        }
        if let Some(output) = &self.output.output {
            config.output.filename = output.clone();
        }
        config.output.disable_photon_timestamps |= self.output.disable_photon_timestamps;
        config.output.disable_integral_light |= self.output.disable_integral_light;
        if let Some(nthreads) = self.run.nthreads {
            config.workers = nthreads;
        }
        if let Some(photons) = self.run.photons_per_event {
            config.photon_gun.photons_per_event = photons;
        }
        if let Some(seed) = self.run.seed {
            config.photon_gun.seed = seed;
        }

        config.validate()?;
        Ok(config)
    }
}
