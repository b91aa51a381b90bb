// ============================================================
// Layer 2 — EvalUseCase
// ============================================================
// Scores a trained generator on a directory of LR/HR pairs:
//
//   Step 1: Read train_config.json and pick the epoch  (Layer 6)
//   Step 2: Pair LR/HR images by filename              (Layer 4)
//   Step 3: Prepare the PNG output directory, if any   (Layer 6)
//   Step 4: Full-image inference + PSNR                (Layer 5)

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    decoder::{DecodeLimits, ImageDecoder},
    loader::PairedDirSource,
};
use crate::domain::traits::PairSource;
use crate::infra::{checkpoint::CheckpointManager, image_store::ImageStore};
use crate::ml::{
    evaluator::{run_evaluation, EvalReport},
    trainer::BackendKind,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    pub lr_dir:         String,
    pub hr_dir:         String,
    pub checkpoint_dir: String,
    /// Latest checkpoint when None
    pub epoch:          Option<usize>,
    /// Where to write super-resolved PNGs; nothing is written when None
    pub output_dir:     Option<String>,
    pub decode_limits:  DecodeLimits,
    pub backend:        BackendKind,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            lr_dir:         "data/eval/lr".to_string(),
            hr_dir:         "data/eval/hr".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            epoch:          None,
            output_dir:     None,
            decode_limits:  DecodeLimits::default(),
            backend:        BackendKind::Wgpu,
        }
    }
}

pub struct EvalUseCase {
    config: EvalConfig,
}

impl EvalUseCase {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvalReport> {
        let cfg = &self.config;

        // ── Step 1: Checkpoint and architecture ───────────────────────────────
        let ckpt      = CheckpointManager::open(&cfg.checkpoint_dir)?;
        let train_cfg = ckpt.load_config()?;
        let epoch     = ckpt.resolve_epoch(cfg.epoch)?;

        // ── Step 2: Evaluation pairs ──────────────────────────────────────────
        let pairs = PairedDirSource::new(&cfg.lr_dir, &cfg.hr_dir).load_pairs()?;
        tracing::info!("Evaluating {} image pairs with epoch {}", pairs.len(), epoch);

        // ── Step 3: Output directory ──────────────────────────────────────────
        let store = cfg.output_dir.as_ref().map(ImageStore::new).transpose()?;
        if let Some(store) = &store {
            tracing::info!("Writing super-resolved images to '{}'", store.dir().display());
        }

        // ── Step 4: Inference ─────────────────────────────────────────────────
        run_evaluation(
            cfg.backend,
            &ckpt,
            &train_cfg,
            epoch,
            ImageDecoder::new(cfg.decode_limits),
            &pairs,
            store.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::infra::checkpoint::GENERATOR;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    /// A checkpoint directory holding an untrained x2 generator.
    fn fake_checkpoint(dir: &std::path::Path) {
        let train_cfg = TrainConfig { scale: 2, channels: 4, residual_blocks: 1, ..TrainConfig::default() };
        let ckpt = CheckpointManager::new(dir).unwrap();
        let generator = train_cfg.generator_config().init::<NdArray>(&Default::default());
        ckpt.save_config(&train_cfg).unwrap();
        ckpt.save_module(GENERATOR, &generator, 2).unwrap();
        ckpt.mark_latest(2).unwrap();
    }

    fn eval_dirs(root: &std::path::Path) -> (String, String) {
        let lr_dir = root.join("lr");
        let hr_dir = root.join("hr");
        fs::create_dir_all(&lr_dir).unwrap();
        fs::create_dir_all(&hr_dir).unwrap();
        RgbImage::from_pixel(5, 5, Rgb([90, 90, 90])).save(lr_dir.join("x.png")).unwrap();
        RgbImage::from_pixel(10, 10, Rgb([90, 90, 90])).save(hr_dir.join("x.png")).unwrap();
        (lr_dir.display().to_string(), hr_dir.display().to_string())
    }

    #[test]
    fn test_execute_latest_epoch_and_write_outputs() {
        let tmp = TempDir::new().unwrap();
        fake_checkpoint(&tmp.path().join("ckpt"));
        let (lr_dir, hr_dir) = eval_dirs(tmp.path());
        let out_dir = tmp.path().join("out");

        let report = EvalUseCase::new(EvalConfig {
            lr_dir,
            hr_dir,
            checkpoint_dir: tmp.path().join("ckpt").display().to_string(),
            output_dir:     Some(out_dir.display().to_string()),
            backend:        BackendKind::Ndarray,
            ..EvalConfig::default()
        })
        .execute()
        .unwrap();

        assert_eq!(report.epoch, 2);
        assert_eq!(report.scores.len(), 1);
        assert!(report.mean_psnr().is_some());
        assert!(out_dir.join("x.png").exists());
    }

    #[test]
    fn test_missing_checkpoint_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let (lr_dir, hr_dir) = eval_dirs(tmp.path());

        let result = EvalUseCase::new(EvalConfig {
            lr_dir,
            hr_dir,
            checkpoint_dir: tmp.path().join("missing").display().to_string(),
            backend:        BackendKind::Ndarray,
            ..EvalConfig::default()
        })
        .execute();
        assert!(result.is_err());
    }
}
