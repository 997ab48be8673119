use adashare::{logging, Experiment, ExperimentArgs};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

fn main() -> Result<()> {
    let args = ExperimentArgs::parse();

    logging::init_logging(false).context("Failed to initialize logging")?;

    let experiment = Experiment::setup(args).context("Failed to set up experiment")?;

    info!("Experiment '{}' ready", experiment.exp_name);
    info!("  - Targets: {:?}", experiment.config.targets()?);
    info!("  - GPUs: {:?}", experiment.gpus);
    info!("  - Device: {:?}", experiment.device);
    info!("  - Options: {}", experiment.options_file.display());

    Ok(())
}
