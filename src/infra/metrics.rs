// ============================================================
// Layer 6: Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Columns:
//   epoch      the epoch number (1, 2, 3, ...)
//   lr         learning rate used for that epoch
//   train_loss mean cross-entropy over the training set
//   train_acc  top-1 accuracy over the (augmented) training set
//   val_loss   mean cross-entropy on the held-out set
//   val_acc    top-1 accuracy on the held-out set
//
// Output file: checkpoints/metrics.csv
//
// Example CSV output:
//   epoch,lr,train_loss,train_acc,val_loss,val_acc
//   1,0.100000,1.712300,0.372100,1.498800,0.462000
//   2,0.100000,1.201900,0.565400,1.187300,0.584100

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,lr,train_loss,train_acc,val_loss,val_acc";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,
    pub lr: f64,
    pub train_loss: f64,
    pub train_acc: f64,
    pub val_loss: f64,
    /// Fraction in [0.0, 1.0]
    pub val_acc: f64,
}

impl EpochMetrics {
    pub fn new(
        epoch:      usize,
        lr:         f64,
        train_loss: f64,
        train_acc:  f64,
        val_loss:   f64,
        val_acc:    f64,
    ) -> Self {
        Self { epoch, lr, train_loss, train_acc, val_loss, val_acc }
    }

    /// Returns true if this epoch beat the previous best val_acc
    pub fn is_improvement(&self, best_val_acc: f64) -> bool {
        self.val_acc > best_val_acc
    }

    fn to_csv_row(&self) -> String {
        format!(
            "{},{:.6},{:.6},{:.6},{:.6},{:.6}",
            self.epoch, self.lr, self.train_loss, self.train_acc, self.val_loss, self.val_acc,
        )
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet, so
    /// repeated runs append to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{}", m.to_csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_acc={:.4}",
            m.epoch,
            m.train_loss,
            m.val_acc,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 0.1, 1.2, 0.55, 1.1, 0.60);
        assert!(m.is_improvement(0.5));
        assert!(!m.is_improvement(0.60));
        assert!(m.is_improvement(f64::NEG_INFINITY));
    }

    #[test]
    fn test_csv_row_format() {
        let m = EpochMetrics::new(1, 0.1, 2.0, 0.25, 1.5, 0.5);
        assert_eq!(m.to_csv_row(), "1,0.100000,2.000000,0.250000,1.500000,0.500000");
    }

    #[test]
    fn test_logger_appends_rows_after_header() {
        let dir = std::env::temp_dir()
            .join(format!("resnet-v2-cifar-metrics-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let logger = MetricsLogger::new(&dir).unwrap();
        logger.log(&EpochMetrics::new(1, 0.1, 2.0, 0.2, 1.9, 0.3)).unwrap();
        logger.log(&EpochMetrics::new(2, 0.1, 1.8, 0.3, 1.7, 0.4)).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[2].starts_with("2,"));
        fs::remove_dir_all(&dir).ok();
    }
}
