//! Experiment output directories

use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

/// Name of the flattened configuration dump inside the log directory
pub const OPTIONS_FILE: &str = "opt.txt";

/// Make sure `<base>/<exp_name>` exists for every entry of `paths`.
///
/// Returns the experiment directories in document order. Existing directories
/// are left alone.
pub fn create_experiment_dirs(config: &Config, exp_name: &str) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();

    for (role, base) in config.paths()? {
        let dir = base.join(exp_name);
        fs::create_dir_all(&dir)?;
        debug!("Ensured {} directory {}", role, dir.display());
        created.push(dir);
    }

    Ok(created)
}

/// `<paths.log_dir>/<exp_name>/opt.txt`
pub fn log_file(config: &Config, exp_name: &str) -> Result<PathBuf> {
    let log_dir = config
        .paths()?
        .into_iter()
        .find(|(role, _)| role == "log_dir")
        .map(|(_, base)| base)
        .ok_or_else(|| Error::missing_key("paths.log_dir"))?;

    Ok(log_dir.join(exp_name).join(OPTIONS_FILE))
}
