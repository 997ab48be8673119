//! Per-epoch reduction and console summary of training/validation metrics
//!
//! The training loop appends one loss and one accuracy-or-error value per
//! batch to a [`ResultsTable`]. At the end of the epoch [`report`] replaces
//! every list by its mean and prints one row per target.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Header of the loss column
pub const LOSS_COLUMN: &str = "train-loss / val-loss";

/// Header of the accuracy-or-error column
pub const METRIC_COLUMN: &str = "train-metric / val-metric";

/// A metric before (`Batches`) or after (`Mean`) reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Mean(f64),
    Batches(Vec<f64>),
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Batches(Vec::new())
    }
}

impl Metric {
    /// Append a batch value. A reduced metric starts a fresh list.
    pub fn push(&mut self, value: f64) {
        match self {
            Metric::Batches(values) => values.push(value),
            Metric::Mean(_) => *self = Metric::Batches(vec![value]),
        }
    }

    /// Replace the batch values by their mean and return it.
    /// Reducing twice returns the same mean.
    pub fn reduce(&mut self) -> f64 {
        let mean = match self {
            Metric::Mean(mean) => return *mean,
            Metric::Batches(values) => {
                Array1::from_vec(std::mem::take(values)).mean().unwrap_or_else(|| {
                    warn!("Reducing a metric with no batch values");
                    f64::NAN
                })
            }
        };
        *self = Metric::Mean(mean);
        mean
    }

    /// The mean, once reduced
    pub fn mean(&self) -> Option<f64> {
        match self {
            Metric::Mean(mean) => Some(*mean),
            Metric::Batches(_) => None,
        }
    }
}

/// Loss and accuracy-or-error for one split
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub loss: Metric,
    #[serde(rename = "ACC or MSE")]
    pub acc_or_mse: Metric,
}

impl SplitRecord {
    /// Record one batch
    pub fn record(&mut self, loss: f64, acc_or_mse: f64) {
        self.loss.push(loss);
        self.acc_or_mse.push(acc_or_mse);
    }

    fn reduce(&mut self) -> (f64, f64) {
        (self.loss.reduce(), self.acc_or_mse.reduce())
    }
}

/// Train and validation records for one target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetResults {
    pub train: SplitRecord,
    pub val: SplitRecord,
}

/// Per-target accumulator for one epoch
pub type ResultsTable = HashMap<String, TargetResults>;

/// One row of the epoch table
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// Target name
    pub target: String,
    /// `"train / val"` loss cell
    pub loss: String,
    /// `"train / val"` accuracy-or-error cell
    pub metric: String,
}

/// Rendered epoch table, rows in target order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EpochSummary {
    pub rows: Vec<SummaryRow>,
}

impl EpochSummary {
    /// Row for `target`, if present
    pub fn row(&self, target: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|row| row.target == target)
    }
}

impl fmt::Display for EpochSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index_width = self.rows.iter().map(|r| r.target.len()).max().unwrap_or(0);
        let loss_width = self
            .rows
            .iter()
            .map(|r| r.loss.len())
            .chain(std::iter::once(LOSS_COLUMN.len()))
            .max()
            .unwrap_or(0);
        let metric_width = self
            .rows
            .iter()
            .map(|r| r.metric.len())
            .chain(std::iter::once(METRIC_COLUMN.len()))
            .max()
            .unwrap_or(0);

        write!(
            f,
            "{:<iw$}  {:>lw$}  {:>mw$}",
            "",
            LOSS_COLUMN,
            METRIC_COLUMN,
            iw = index_width,
            lw = loss_width,
            mw = metric_width
        )?;
        for row in &self.rows {
            write!(
                f,
                "\n{:<iw$}  {:>lw$}  {:>mw$}",
                row.target,
                row.loss,
                row.metric,
                iw = index_width,
                lw = loss_width,
                mw = metric_width
            )?;
        }
        Ok(())
    }
}

fn cell(train: f64, val: f64) -> String {
    format!("{:.2} / {:.2}", train, val)
}

/// Reduce every target named in `task.cat_target` and `task.num_target` (in
/// that order) to its means and build the epoch table.
pub fn summarize(results: &mut ResultsTable, config: &Config) -> Result<EpochSummary> {
    let mut targets = config.cat_targets()?;
    targets.extend(config.num_targets()?);

    let mut summary = EpochSummary::default();
    for target in targets {
        let record = results
            .get_mut(&target)
            .ok_or_else(|| Error::missing_key(format!("results.{}", target)))?;

        let (train_loss, train_metric) = record.train.reduce();
        let (val_loss, val_metric) = record.val.reduce();
        info!(
            "{}: loss {:.4} / {:.4}, acc or mse {:.4} / {:.4}",
            target, train_loss, val_loss, train_metric, val_metric
        );

        summary.rows.push(SummaryRow {
            loss: cell(train_loss, val_loss),
            metric: cell(train_metric, val_metric),
            target,
        });
    }

    Ok(summary)
}

/// Reduce `results` in place and print the epoch table to stdout
pub fn report(results: &mut ResultsTable, config: &Config) -> Result<()> {
    let summary = summarize(results, config)?;
    println!("{}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config(cat: &str, num: &str) -> Config {
        Config::from_yaml_str(&format!("task:\n  cat_target: {}\n  num_target: {}\n", cat, num))
            .unwrap()
    }

    fn sample_results() -> ResultsTable {
        serde_yaml::from_str(
            r#"
A:
  train:
    loss: [1.0, 3.0]
    ACC or MSE: [0.5, 0.7]
  val:
    loss: [2.0]
    ACC or MSE: [0.6]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_reduce_and_cells() {
        let mut results = sample_results();
        let summary = summarize(&mut results, &config("[A]", "[]")).unwrap();

        let a = &results["A"];
        assert_eq!(a.train.loss, Metric::Mean(2.0));
        assert_relative_eq!(a.train.acc_or_mse.mean().unwrap(), 0.6, epsilon = 1e-12);
        assert_eq!(a.val.loss.mean(), Some(2.0));

        let row = summary.row("A").unwrap();
        assert_eq!(row.loss, "2.00 / 2.00");
        assert_eq!(row.metric, "0.60 / 0.60");
    }

    #[test]
    fn test_rows_follow_categorical_then_numeric() {
        let mut results = ResultsTable::new();
        for (name, loss) in [("age", 4.0), ("sex", 0.25)] {
            let entry = results.entry(name.to_string()).or_default();
            entry.train.record(loss, 0.5);
            entry.val.record(loss, 0.5);
        }

        let summary = summarize(&mut results, &config("[sex]", "[age]")).unwrap();
        let order: Vec<&str> = summary.rows.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(order, vec!["sex", "age"]);
        assert_eq!(summary.row("age").unwrap().loss, "4.00 / 4.00");
    }

    #[test]
    fn test_missing_target_is_key_error() {
        let mut results = sample_results();
        let result = summarize(&mut results, &config("[A]", "[B]"));
        assert!(matches!(result, Err(Error::MissingKey(key)) if key == "results.B"));
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let mut metric = Metric::Batches(vec![1.0, 2.0]);
        assert_eq!(metric.reduce(), 1.5);
        assert_eq!(metric.reduce(), 1.5);

        metric.push(4.0);
        assert_eq!(metric, Metric::Batches(vec![4.0]));
    }

    #[test]
    fn test_empty_metric_reduces_to_nan() {
        let mut metric = Metric::default();
        assert!(metric.reduce().is_nan());
    }

    #[test]
    fn test_table_layout() {
        let mut results = sample_results();
        let summary = summarize(&mut results, &config("[A]", "[]")).unwrap();
        let rendered = summary.to_string();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(LOSS_COLUMN));
        assert!(lines[0].contains(METRIC_COLUMN));
        assert!(lines[1].starts_with("A  "));
        assert!(lines[1].ends_with("0.60 / 0.60"));
        assert_eq!(lines[0].len(), lines[1].len());
    }
}
