//! adashare - experiment utilities for multitask training
//!
//! Loads an experiment configuration from a YAML file plus command-line
//! overrides, fixes the random seed, prepares output directories and logs the
//! resolved options. Also provides layer-wise weight initialization for
//! candle models and the per-epoch metrics table.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod init;
pub mod logging;
pub mod metrics;
pub mod paths;
pub mod printer;
pub mod seed;

// Re-exports
pub use config::{read_config, Config, ExperimentArgs, ModelChoice};
pub use error::{Error, Result};
pub use init::{initialize, Init, InitFn, InitParams, Layer, LayerKind, Module, Sequential};
pub use metrics::{report, EpochSummary, ResultsTable, TargetResults};
pub use seed::fix_random_seed;

use candle_core::Device;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Width of the `#` banners printed during startup
pub const BANNER_WIDTH: usize = 50;

/// A configured experiment, ready for model construction
#[derive(Debug, Clone)]
pub struct Experiment {
    /// Merged configuration
    pub config: Config,
    /// GPU indices requested on the command line
    pub gpus: Vec<usize>,
    /// Experiment name
    pub exp_name: String,
    /// Device selected from the first GPU index, CPU when none is usable
    pub device: Device,
    /// Per-role experiment directories
    pub dirs: Vec<PathBuf>,
    /// Location of the flattened options dump
    pub options_file: PathBuf,
}

impl Experiment {
    /// Parse the process arguments and run the startup sequence.
    /// Usage errors print clap's message and exit.
    pub fn from_env() -> Result<Self> {
        Self::setup(ExperimentArgs::parse())
    }

    /// Startup sequence: load and merge the configuration, fix the seed,
    /// create the output directories, then print and save the options.
    #[instrument(skip(args), fields(exp_name = %args.exp_name))]
    pub fn setup(args: ExperimentArgs) -> Result<Self> {
        printer::print_separator("READ YAML", BANNER_WIDTH);
        let config = Config::from_args(&args)?;

        let device = select_device(&args.gpus)?;
        seed::fix_random_seed(config.seed()?, &device)?;

        let dirs = paths::create_experiment_dirs(&config, &args.exp_name)?;

        let lines = printer::flatten(config.as_mapping());
        for line in &lines {
            println!("{}", line);
        }
        println!("{}", "-".repeat(BANNER_WIDTH + 3));

        let options_file = paths::log_file(&config, &args.exp_name)?;
        printer::write_lines(&options_file, &lines)?;
        info!("Options written to {}", options_file.display());

        Ok(Self {
            config,
            gpus: args.gpus,
            exp_name: args.exp_name,
            device,
            dirs,
            options_file,
        })
    }
}

fn select_device(gpus: &[usize]) -> Result<Device> {
    match gpus.first() {
        Some(&ordinal) => Ok(Device::cuda_if_available(ordinal)?),
        None => Ok(Device::Cpu),
    }
}
