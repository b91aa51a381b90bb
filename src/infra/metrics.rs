// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - train_loss:  average total generator loss
//   - pixel, perceptual, texture, adversarial: averaged loss terms
//   - loss_d, d_real, d_fake: discriminator loss and mean outputs
//     (zero when the adversarial loss is off)
//   - val_loss:    average pixel MSE on validation patches
//   - val_psnr:    average per-image PSNR on validation patches
//
// Output file: checkpoints/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,pixel,perceptual,texture,adversarial,loss_d,d_real,d_fake,val_loss,val_psnr
//   1,0.012400,0.004100,0.006200,0.000900,0.693100,1.386000,0.510000,0.497000,0.003900,24.089200
//
// A new run appends to an existing file.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str =
    "epoch,train_loss,pixel,perceptual,texture,adversarial,loss_d,d_real,d_fake,val_loss,val_psnr";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:       usize,
    pub train_loss:  f64,
    pub pixel:       f64,
    pub perceptual:  f64,
    pub texture:     f64,
    pub adversarial: f64,
    pub loss_d:      f64,
    pub d_real:      f64,
    pub d_fake:      f64,
    pub val_loss:    f64,
    /// Higher is better; infinite when a validation patch is reproduced exactly
    pub val_psnr:    f64,
}

impl EpochMetrics {
    /// Returns true if this epoch improved over the previous best PSNR
    pub fn is_improvement(&self, best_psnr: f64) -> bool {
        self.val_psnr > best_psnr
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
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

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.pixel,
            m.perceptual,
            m.texture,
            m.adversarial,
            m.loss_d,
            m.d_real,
            m.d_fake,
            m.val_loss,
            m.val_psnr,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_psnr={:.2}",
            m.epoch,
            m.train_loss,
            m.val_psnr,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
