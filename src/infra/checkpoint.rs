// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores network weights using Burn's CompactRecorder.
//
// File naming convention:
//   checkpoints/
//     generator_epoch_1.mpk.gz       ← generator after epoch 1
//     discriminator_epoch_1.mpk.gz   ← only for adversarial runs
//     ...
//     latest_epoch.json              ← number of the latest epoch
//     train_config.json              ← hyperparameters of the run
//
// The config is needed to rebuild the generator with the right
// depth, width and scale before its weights can be loaded.

use anyhow::{ensure, Context, Result};
use burn::{module::Module, prelude::*, record::CompactRecorder};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;

pub const GENERATOR: &str = "generator";
pub const DISCRIMINATOR: &str = "discriminator";

const LATEST_FILE: &str = "latest_epoch.json";
const CONFIG_FILE: &str = "train_config.json";

/// Manages the files of one checkpoint directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing directory without creating it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure!(
            dir.is_dir(),
            "Checkpoint directory '{}' does not exist. Have you run 'train' first?",
            dir.display()
        );
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path without extension; the recorder appends `.mpk.gz`.
    fn module_path(&self, name: &str, epoch: usize) -> PathBuf {
        self.dir.join(format!("{name}_epoch_{epoch}"))
    }

    /// Write `module` as `{name}_epoch_{epoch}.mpk.gz`.
    pub fn save_module<B: Backend, M: Module<B>>(&self, name: &str, module: &M, epoch: usize) -> Result<()> {
        let path = self.module_path(name, epoch);
        module
            .clone()
            .save_file(path.clone(), &CompactRecorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved {} checkpoint: epoch {}", name, epoch);
        Ok(())
    }

    /// Load `{name}_epoch_{epoch}` into `module`, which must have the
    /// same architecture as the saved one.
    pub fn load_module<B: Backend, M: Module<B>>(
        &self,
        name:   &str,
        module: M,
        epoch:  usize,
        device: &B::Device,
    ) -> Result<M> {
        let path = self.module_path(name, epoch);
        tracing::info!("Loading {} checkpoint from epoch {}", name, epoch);

        module
            .load_file(path.clone(), &CompactRecorder::new(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })
    }

    /// Record `epoch` as the most recent complete checkpoint.
    pub fn mark_latest(&self, epoch: usize) -> Result<()> {
        let path = self.dir.join(LATEST_FILE);
        fs::write(&path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", path.display()))
    }

    /// Read latest_epoch.json and return the epoch number.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Have you run 'train' first?", path.display()))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }

    /// The requested epoch, or the latest one when none is given.
    pub fn resolve_epoch(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            Some(epoch) => Ok(epoch),
            None => self.latest_epoch(),
        }
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' before 'eval'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed training config '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::generator::GeneratorConfig;
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn outputs(generator: &crate::ml::generator::Generator<TestBackend>) -> Vec<f32> {
        let x = Tensor::<TestBackend, 4>::full([1, 3, 4, 4], 0.5, &Default::default());
        generator.forward(x).into_data().to_vec().unwrap()
    }

    #[test]
    fn test_module_round_trip_restores_weights() {
        let tmp    = TempDir::new().unwrap();
        let ckpt   = CheckpointManager::new(tmp.path()).unwrap();
        let device = Default::default();
        let config = GeneratorConfig::new().with_channels(4).with_num_residual_blocks(1).with_scale_factor(2);

        let trained = config.init::<TestBackend>(&device);
        ckpt.save_module(GENERATOR, &trained, 3).unwrap();
        assert!(tmp.path().join("generator_epoch_3.mpk.gz").exists());

        let restored = ckpt
            .load_module(GENERATOR, config.init::<TestBackend>(&device), 3, &device)
            .unwrap();

        // half-precision records: compare with a loose tolerance
        for (a, b) in outputs(&trained).iter().zip(outputs(&restored)) {
            assert!((a - b).abs() < 1e-2, "{a} vs {b}");
        }
    }

    #[test]
    fn test_latest_epoch_pointer() {
        let tmp  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(tmp.path()).unwrap();

        assert!(ckpt.latest_epoch().is_err());
        ckpt.mark_latest(4).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 4);
        assert_eq!(ckpt.resolve_epoch(None).unwrap(), 4);
        assert_eq!(ckpt.resolve_epoch(Some(2)).unwrap(), 2);
    }

    #[test]
    fn test_config_round_trip() {
        let tmp  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(tmp.path()).unwrap();

        let cfg = TrainConfig { epochs: 7, scale: 2, ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();

        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.epochs, 7);
        assert_eq!(loaded.scale, 2);
    }

    #[test]
    fn test_open_missing_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(CheckpointManager::open(tmp.path().join("nope")).is_err());
    }
}
