// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration
//   Step 2: Pair LR/HR images by filename  (Layer 4 - data)
//   Step 3: Split train/validation         (Layer 4 - data)
//   Step 4: Build patch datasets           (Layer 4 - data)
//   Step 5: Save config                    (Layer 6 - infra)
//   Step 6: Run training loop              (Layer 5 - ml)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    dataset::{PatchDataset, PatchOptions},
    decoder::{DecodeLimits, ImageDecoder},
    loader::PairedDirSource,
    normalize::Normalizer,
    splitter::split_train_val,
};
use crate::domain::traits::PairSource;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{
    adversarial::AdversarialMode,
    generator::GeneratorConfig,
    losses::{LossWeights, DEFAULT_TEXTURE_PATCH},
    trainer::{run_training, BackendKind},
};

/// Smallest HR patch that survives the five VGG pools.
const MIN_PERCEPTUAL_PATCH: u32 = 32;

/// Smallest texture tile that still has a spatial extent at relu3_1.
const MIN_TEXTURE_PATCH: usize = 4;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Saved next to the checkpoints so evaluation can rebuild the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub lr_dir:             String,
    pub hr_dir:             String,
    pub checkpoint_dir:     String,
    pub epochs:             usize,
    pub batch_size:         usize,
    pub learning_rate:      f64,
    /// LR patch edge; the HR patch is `patch_size * scale`
    pub patch_size:         u32,
    pub scale:              u32,
    pub residual_blocks:    usize,
    pub channels:           usize,
    pub perceptual:         bool,
    pub texture:            bool,
    pub texture_patch:      usize,
    pub adversarial:        AdversarialMode,
    pub adversarial_weight: f32,
    pub pixel_weight:       f32,
    pub vgg_weights:        Option<PathBuf>,
    pub val_fraction:       f64,
    pub seed:               u64,
    pub num_workers:        usize,
    pub precompute_bicubic: bool,
    pub decode_limits:      DecodeLimits,
    pub normalizer:         Normalizer,
    pub backend:            BackendKind,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            lr_dir:             "data/train/lr".to_string(),
            hr_dir:             "data/train/hr".to_string(),
            checkpoint_dir:     "checkpoints".to_string(),
            epochs:             10,
            batch_size:         16,
            learning_rate:      1e-4,
            patch_size:         32,
            scale:              4,
            residual_blocks:    10,
            channels:           64,
            perceptual:         false,
            texture:            false,
            texture_patch:      DEFAULT_TEXTURE_PATCH,
            adversarial:        AdversarialMode::Off,
            adversarial_weight: 1.0,
            pixel_weight:       1.0,
            vgg_weights:        None,
            val_fraction:       0.1,
            seed:               42,
            num_workers:        1,
            precompute_bicubic: false,
            decode_limits:      DecodeLimits::default(),
            normalizer:         Normalizer::UNIT,
            backend:            BackendKind::Wgpu,
        }
    }
}

impl TrainConfig {
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::new()
            .with_channels(self.channels)
            .with_num_residual_blocks(self.residual_blocks)
            .with_scale_factor(self.scale as usize)
    }

    pub fn loss_weights(&self) -> LossWeights {
        LossWeights {
            pixel:         self.pixel_weight,
            perceptual:    self.perceptual,
            texture:       self.texture,
            texture_patch: self.texture_patch,
            adversarial:   self.adversarial_weight,
        }
    }

    pub fn patch_options(&self, seed: u64) -> PatchOptions {
        PatchOptions {
            patch_size:         self.patch_size,
            scale:              self.scale,
            seed,
            precompute_bicubic: self.precompute_bicubic,
            normalizer:         self.normalizer,
            decoder:            ImageDecoder::new(self.decode_limits),
        }
    }

    /// Reject configurations that would fail or silently misbehave
    /// once training has started.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.epochs > 0, "epochs must be at least 1");
        ensure!(self.batch_size > 0, "batch size must be at least 1");
        ensure!(self.num_workers > 0, "number of workers must be at least 1");
        ensure!(
            self.learning_rate.is_finite() && self.learning_rate > 0.0,
            "learning rate must be a positive number, got {}",
            self.learning_rate
        );
        ensure!(self.patch_size > 0, "patch size must be at least 1");
        ensure!(
            self.scale >= 2 && self.scale.is_power_of_two(),
            "scale must be a power of two >= 2, got {}",
            self.scale
        );
        ensure!(self.channels > 0, "channels must be at least 1");
        ensure!(
            (0.0..1.0).contains(&self.val_fraction),
            "validation fraction must be in [0, 1), got {}",
            self.val_fraction
        );
        ensure!(
            self.pixel_weight >= 0.0 && self.adversarial_weight >= 0.0,
            "loss weights must be non-negative"
        );

        let hr_patch = self.patch_size * self.scale;
        if self.perceptual || self.texture {
            ensure!(
                self.vgg_weights.is_some(),
                "perceptual and texture losses need --vgg-weights"
            );
        }
        if self.perceptual {
            ensure!(
                hr_patch >= MIN_PERCEPTUAL_PATCH,
                "perceptual loss needs an HR patch of at least {MIN_PERCEPTUAL_PATCH}px, got {hr_patch}"
            );
        }
        if self.texture {
            ensure!(
                self.texture_patch >= MIN_TEXTURE_PATCH && self.texture_patch <= hr_patch as usize,
                "texture patch must be between {MIN_TEXTURE_PATCH} and the HR patch ({hr_patch}), got {}",
                self.texture_patch
            );
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Pair images by filename ───────────────────────────────────
        tracing::info!("Loading image pairs from '{}' and '{}'", cfg.lr_dir, cfg.hr_dir);
        let pairs = PairedDirSource::new(&cfg.lr_dir, &cfg.hr_dir).load_pairs()?;

        // ── Step 3: Train / validation split ──────────────────────────────────
        let (train_pairs, val_pairs) = split_train_val(pairs, 1.0 - cfg.val_fraction, cfg.seed);
        ensure!(!train_pairs.is_empty(), "No image pairs left for training after the split");
        tracing::info!(
            "Split: {} train, {} validation",
            train_pairs.len(),
            val_pairs.len()
        );

        // ── Step 4: Build Burn datasets ───────────────────────────────────────
        // distinct seeds so validation crops do not mirror training crops
        let train_dataset = PatchDataset::new(train_pairs, cfg.patch_options(cfg.seed))?;
        let val_dataset   = PatchDataset::new(val_pairs, cfg.patch_options(cfg.seed.wrapping_add(1)))?;

        // ── Step 5: Save config for evaluation ────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training(cfg, train_dataset, val_dataset, ckpt_manager, metrics)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_power_of_two_scale() {
        let cfg = TrainConfig { scale: 3, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_feature_losses_need_vgg_weights() {
        let cfg = TrainConfig { perceptual: true, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());

        let cfg = TrainConfig {
            perceptual: true,
            vgg_weights: Some(PathBuf::from("vgg19")),
            ..TrainConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_texture_patch_must_fit_hr_patch() {
        let cfg = TrainConfig {
            texture: true,
            vgg_weights: Some(PathBuf::from("vgg19")),
            patch_size: 2,
            scale: 2,
            ..TrainConfig::default()
        };
        // HR patch is 4, default tile is 16
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let cfg = TrainConfig { num_workers: 0, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
        // fails before any data is touched
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_rejects_full_validation_split() {
        let cfg = TrainConfig { val_fraction: 1.0, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_generator_config_follows_train_config() {
        let cfg = TrainConfig { channels: 8, residual_blocks: 2, scale: 2, ..TrainConfig::default() };
        let g = cfg.generator_config();
        assert_eq!((g.channels, g.num_residual_blocks, g.scale_factor), (8, 2, 2));
    }

    #[test]
    fn test_execute_end_to_end_on_cpu() {
        let tmp = TempDir::new().unwrap();
        let lr_dir = tmp.path().join("lr");
        let hr_dir = tmp.path().join("hr");
        fs::create_dir_all(&lr_dir).unwrap();
        fs::create_dir_all(&hr_dir).unwrap();
        for (i, name) in ["a.png", "b.png"].iter().enumerate() {
            let v = 60 + 40 * i as u8;
            RgbImage::from_pixel(8, 8, Rgb([v, v, v])).save(lr_dir.join(name)).unwrap();
            RgbImage::from_pixel(16, 16, Rgb([v, v, v])).save(hr_dir.join(name)).unwrap();
        }

        let ckpt_dir = tmp.path().join("ckpt");
        let cfg = TrainConfig {
            lr_dir:          lr_dir.display().to_string(),
            hr_dir:          hr_dir.display().to_string(),
            checkpoint_dir:  ckpt_dir.display().to_string(),
            epochs:          1,
            batch_size:      1,
            patch_size:      4,
            scale:           2,
            residual_blocks: 1,
            channels:        4,
            val_fraction:    0.5,
            backend:         BackendKind::Ndarray,
            ..TrainConfig::default()
        };

        TrainUseCase::new(cfg).execute().unwrap();

        assert!(ckpt_dir.join("generator_epoch_1.mpk.gz").exists());
        assert!(ckpt_dir.join("train_config.json").exists());
        let csv = fs::read_to_string(ckpt_dir.join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }
}
