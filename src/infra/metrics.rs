// ============================================================
// Layer 6 — Validation Round Logger
// ============================================================
// Appends one CSV row per validation round:
//
//   epoch,train_loss,total_val_rmse,total_test_rmse,improved,stalled_rounds
//   0,0.912345,38.104211,40.551902,true,0
//   10,0.402311,31.877012,33.020145,true,0
//   20,0.395120,32.100532,33.020145,false,1
//
// The totals are summed RMSE over all horizons of the current
// best record. Each training run starts the file afresh, like
// the checkpoint it sits next to.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One row of the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundMetrics {
    pub epoch: usize,
    /// Mean MSE over the training batches of this epoch
    pub train_loss: f64,
    pub total_val_rmse: f64,
    pub total_test_rmse: f64,
    pub improved: bool,
    pub stalled_rounds: usize,
}

pub struct RoundLogger {
    csv_path: PathBuf,
}

impl RoundLogger {
    /// Create the log at `csv_path`, dropping rows of any earlier run.
    pub fn new(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();
        if let Some(parent) = csv_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if csv_path.exists() {
            tracing::debug!("Replacing run log '{}'", csv_path.display());
        }
        let mut writer = csv::Writer::from_path(&csv_path)
            .with_context(|| format!("Cannot create run log '{}'", csv_path.display()))?;
        writer.write_record([
            "epoch",
            "train_loss",
            "total_val_rmse",
            "total_test_rmse",
            "improved",
            "stalled_rounds",
        ])?;
        writer.flush()?;
        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &RoundMetrics) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open run log '{}'", self.csv_path.display()))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record([
            m.epoch.to_string(),
            format!("{:.6}", m.train_loss),
            format!("{:.6}", m.total_val_rmse),
            format!("{:.6}", m.total_test_rmse),
            m.improved.to_string(),
            m.stalled_rounds.to_string(),
        ])?;
        writer.flush()?;

        tracing::debug!(
            "Logged round at epoch {}: train_loss={:.4}, val_rmse={:.4}",
            m.epoch,
            m.train_loss,
            m.total_val_rmse,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(epoch: usize, improved: bool) -> RoundMetrics {
        RoundMetrics {
            epoch,
            train_loss: 0.5,
            total_val_rmse: 12.25,
            total_test_rmse: 13.5,
            improved,
            stalled_rounds: usize::from(!improved),
        }
    }

    #[test]
    fn test_header_then_rows_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.rounds.csv");

        let logger = RoundLogger::new(&path).unwrap();
        logger.log(&row(0, true)).unwrap();
        logger.log(&row(10, false)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "epoch,train_loss,total_val_rmse,total_test_rmse,improved,stalled_rounds",
                "0,0.500000,12.250000,13.500000,true,0",
                "10,0.500000,12.250000,13.500000,false,1",
            ]
        );
    }

    #[test]
    fn test_new_run_replaces_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.rounds.csv");

        let first = RoundLogger::new(&path).unwrap();
        first.log(&row(0, true)).unwrap();
        first.log(&row(10, false)).unwrap();

        let second = RoundLogger::new(&path).unwrap();
        second.log(&row(0, true)).unwrap();

        let text = fs::read_to_string(second.csv_path()).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "epoch,train_loss,total_val_rmse,total_test_rmse,improved,stalled_rounds",
                "0,0.500000,12.250000,13.500000,true,0",
            ]
        );
    }
}
