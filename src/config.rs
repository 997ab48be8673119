//! Experiment configuration: command-line schema and YAML merge
//!
//! A [`Config`] is the YAML document describing one training run, kept as an
//! ordered nested mapping so that it can be flattened back out in the order it
//! was written. Command-line values from [`ExperimentArgs`] are overlaid on top
//! of it and always win over the file.

use clap::{Parser, ValueEnum};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Backbone choices accepted by `--model`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelChoice {
    /// 3-D ResNet, 50 layers
    #[value(name = "ResNet3D50")]
    ResNet3D50,
    /// 3-D ResNet, 101 layers
    #[value(name = "ResNet3D101")]
    ResNet3D101,
    /// 3-D ResNet, 152 layers
    #[value(name = "ResNet3D152")]
    ResNet3D152,
}

impl ModelChoice {
    /// Name as written on the command line and in the configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::ResNet3D50 => "ResNet3D50",
            ModelChoice::ResNet3D101 => "ResNet3D101",
            ModelChoice::ResNet3D152 => "ResNet3D152",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command-line arguments for one experiment
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "adashare")]
#[command(version)]
#[command(about = "Set up a multitask training experiment from a YAML config", long_about = None)]
pub struct ExperimentArgs {
    /// Path for the config file
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Experiment name, used as the sub-directory under every output path
    #[arg(long = "exp_name")]
    pub exp_name: String,

    /// GPU indices to train on
    #[arg(long, num_args = 1.., default_values_t = [0usize])]
    pub gpus: Vec<usize>,

    /// Categorical targets (may be empty)
    #[arg(long = "cat_target", num_args = 0.., required = true)]
    pub cat_target: Vec<String>,

    /// Numeric targets (may be empty)
    #[arg(long = "num_target", num_args = 0.., required = true)]
    pub num_target: Vec<String>,

    /// Backbone architecture
    #[arg(long, value_enum)]
    pub model: Option<ModelChoice>,

    /// Fraction of the training set used for warmup
    #[arg(long = "warmup_size", default_value_t = 0.3)]
    pub warmup_size: f64,

    /// Training batch size
    #[arg(long = "train_batch_size", default_value_t = 1)]
    pub train_batch_size: usize,

    /// Validation batch size
    #[arg(long = "val_batch_size", default_value_t = 1)]
    pub val_batch_size: usize,

    /// Test batch size
    #[arg(long = "test_batch_size", default_value_t = 1)]
    pub test_batch_size: usize,

    /// Input volume size after resizing
    #[arg(long, num_args = 3, value_names = ["D", "H", "W"], default_values_t = [96usize, 96, 96])]
    pub resize: Vec<usize>,

    /// Learning rate for the task heads
    #[arg(long, default_value_t = 1e-6)]
    pub lr: f64,

    /// Learning rate for the shared backbone
    #[arg(long = "backbone_lr", default_value_t = 1e-6)]
    pub backbone_lr: f64,

    /// Learning rate for the sharing policy
    #[arg(long = "policy_lr", default_value_t = 1e-4)]
    pub policy_lr: f64,

    /// Weight decay
    #[arg(long = "weight_decay", default_value_t = 0.001)]
    pub weight_decay: f64,

    /// Number of training epochs
    #[arg(long)]
    pub epoch: Option<usize>,
}

/// Nested configuration for one training run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    root: Mapping,
}

impl Config {
    /// Parse a configuration from YAML text. The top level must be a mapping.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        match serde_yaml::from_str::<Value>(content)? {
            Value::Mapping(root) => Ok(Self { root }),
            other => Err(Error::config(format!(
                "top level of the configuration must be a mapping, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Load a configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        debug!("Loaded {} top-level sections from {}", config.root.len(), path.display());
        Ok(config)
    }

    /// Load the YAML file named by `args` and overlay the command-line values
    pub fn from_args(args: &ExperimentArgs) -> Result<Self> {
        let mut config = Self::from_file(&args.config)?;
        config.apply_overrides(args)?;
        info!("Configuration loaded from {}", args.config.display());
        Ok(config)
    }

    /// Overlay command-line values. Every section written to must already
    /// exist in the document.
    pub fn apply_overrides(&mut self, args: &ExperimentArgs) -> Result<()> {
        let targets: Vec<String> = args
            .cat_target
            .iter()
            .chain(args.num_target.iter())
            .cloned()
            .collect();

        self.set("task.cat_target", args.cat_target.clone())?;
        self.set("task.num_target", args.num_target.clone())?;
        self.set("task.targets", targets)?;

        self.set("data_split.warmup_size", args.warmup_size)?;
        self.set("data_split.train_batch_size", args.train_batch_size)?;
        self.set("data_split.val_batch_size", args.val_batch_size)?;
        self.set("data_split.test_batch_size", args.test_batch_size)?;

        self.set("train.lr", args.lr)?;
        self.set("train.policy_lr", args.policy_lr)?;
        self.set("train.backbone_lr", args.backbone_lr)?;
        self.set("train.weight_decay", args.weight_decay)?;
        if let Some(model) = args.model {
            self.set("train.model", model.as_str())?;
        }
        if let Some(epoch) = args.epoch {
            self.set("train.epoch", epoch)?;
        }

        self.set("data_augmentation.resize", args.resize.clone())?;

        self.root
            .insert(Value::from("exp_name"), Value::from(args.exp_name.as_str()));
        Ok(())
    }

    /// The underlying ordered mapping
    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    /// Look up a dotted key path such as `train.lr`
    pub fn get(&self, path: &str) -> Result<&Value> {
        let mut keys = path.split('.');
        let first = keys.next().unwrap_or_default();
        let mut current = self
            .root
            .get(first)
            .ok_or_else(|| Error::missing_key(first))?;
        let mut walked = first.to_string();

        for key in keys {
            walked.push('.');
            walked.push_str(key);
            current = current
                .as_mapping()
                .and_then(|section| section.get(key))
                .ok_or_else(|| Error::missing_key(walked.clone()))?;
        }

        Ok(current)
    }

    /// Set the value at a dotted key path. All parent sections must exist;
    /// the final key is inserted or overwritten.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let (parents, leaf) = match path.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path),
        };

        let mut section = &mut self.root;
        if let Some(parents) = parents {
            let mut walked = String::new();
            for key in parents.split('.') {
                if !walked.is_empty() {
                    walked.push('.');
                }
                walked.push_str(key);
                section = section
                    .get_mut(key)
                    .ok_or_else(|| Error::missing_key(walked.clone()))?
                    .as_mapping_mut()
                    .ok_or_else(|| Error::config(format!("`{}` is not a mapping", walked)))?;
            }
        }

        section.insert(Value::from(leaf), value.into());
        Ok(())
    }

    /// Global random seed
    pub fn seed(&self) -> Result<u64> {
        self.get("seed")?
            .as_u64()
            .ok_or_else(|| Error::config("`seed` must be a non-negative integer"))
    }

    /// Experiment name recorded by the loader
    pub fn exp_name(&self) -> Result<&str> {
        self.get("exp_name")?
            .as_str()
            .ok_or_else(|| Error::config("`exp_name` must be a string"))
    }

    /// Output base directories by role, in document order
    pub fn paths(&self) -> Result<Vec<(String, PathBuf)>> {
        let section = self
            .get("paths")?
            .as_mapping()
            .ok_or_else(|| Error::config("`paths` must be a mapping"))?;

        section
            .iter()
            .map(|(role, base)| {
                let role = role
                    .as_str()
                    .ok_or_else(|| Error::config("`paths` keys must be strings"))?;
                let base = base
                    .as_str()
                    .ok_or_else(|| Error::config(format!("`paths.{}` must be a string", role)))?;
                Ok((role.to_string(), PathBuf::from(base)))
            })
            .collect()
    }

    /// Categorical target names
    pub fn cat_targets(&self) -> Result<Vec<String>> {
        self.string_list("task.cat_target")
    }

    /// Numeric target names
    pub fn num_targets(&self) -> Result<Vec<String>> {
        self.string_list("task.num_target")
    }

    /// All target names, categorical first
    pub fn targets(&self) -> Result<Vec<String>> {
        self.string_list("task.targets")
    }

    fn string_list(&self, path: &str) -> Result<Vec<String>> {
        let value = self.get(path)?;
        // An empty YAML entry reads back as null
        if value.is_null() {
            return Ok(Vec::new());
        }

        value
            .as_sequence()
            .ok_or_else(|| Error::config(format!("`{}` must be a list", path)))?
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::config(format!("`{}` must contain only strings", path)))
            })
            .collect()
    }
}

/// Parse `argv`, load the YAML it names and merge the two.
///
/// Returns the merged configuration, the GPU index list and the experiment
/// name. Usage errors come back as [`Error::Usage`].
pub fn read_config<I, T>(argv: I) -> Result<(Config, Vec<usize>, String)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let args = ExperimentArgs::try_parse_from(argv)?;
    let config = Config::from_args(&args)?;
    Ok((config, args.gpus, args.exp_name))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
