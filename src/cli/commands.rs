// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `eval`, and all their
// configurable flags. Defaults mirror TrainConfig / EvalConfig.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{eval_use_case::EvalConfig, train_use_case::TrainConfig};
use crate::data::decoder::DecodeLimits;
use crate::data::normalize::Normalizer;
use crate::ml::{adversarial::AdversarialMode, trainer::BackendKind};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the super-resolution generator on paired LR/HR images
    Train(TrainArgs),

    /// Score a trained checkpoint with PSNR on paired LR/HR images
    Eval(EvalArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory of low-resolution training images
    #[arg(long, default_value = "data/train/lr")]
    pub lr_dir: String,

    /// Directory of high-resolution training images (same filenames)
    #[arg(long, default_value = "data/train/hr")]
    pub hr_dir: String,

    /// Directory for checkpoints, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Number of passes over the training pairs
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Patches per optimisation step
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// Adam learning rate for generator and discriminator
    #[arg(long, default_value_t = 1e-4)]
    pub learning_rate: f64,

    /// Edge of the random LR crop; the HR crop is patch-size × scale
    #[arg(long, default_value_t = 32)]
    pub patch_size: u32,

    /// Upscaling factor, a power of two
    #[arg(long, default_value_t = 4)]
    pub scale: u32,

    /// Residual blocks in the generator
    #[arg(long, default_value_t = 10)]
    pub residual_blocks: usize,

    /// Feature channels inside the generator
    #[arg(long, default_value_t = 64)]
    pub channels: usize,

    /// Add the VGG perceptual loss (needs --vgg-weights)
    #[arg(long)]
    pub perceptual: bool,

    /// Add the gram-matrix texture loss (needs --vgg-weights)
    #[arg(long)]
    pub texture: bool,

    /// Tile size for the texture loss
    #[arg(long, default_value_t = 16)]
    pub texture_patch: usize,

    /// Adversarial objective; `off` trains without a discriminator
    #[arg(long, value_enum, default_value_t = AdversarialMode::Off)]
    pub adversarial: AdversarialMode,

    /// Multiplier on the generator's adversarial loss
    #[arg(long, default_value_t = 1.0)]
    pub adversarial_weight: f32,

    /// Multiplier on the pixel MSE loss
    #[arg(long, default_value_t = 1.0)]
    pub pixel_weight: f32,

    /// Pretrained VGG-19 record (named MessagePack, without extension)
    #[arg(long)]
    pub vgg_weights: Option<PathBuf>,

    /// Fraction of pairs held out for validation PSNR
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f64,

    /// Seed for the split, crops, labels and weight init
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// DataLoader worker threads, at least 1
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Compute the bicubic baseline on the CPU while loading patches
    #[arg(long)]
    pub precompute_bicubic: bool,

    /// Decoder allocation limit per image, in MiB
    #[arg(long, default_value_t = 512)]
    pub max_decode_mb: u64,

    /// Compute backend: wgpu (GPU) or ndarray (CPU)
    #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            lr_dir:             a.lr_dir,
            hr_dir:             a.hr_dir,
            checkpoint_dir:     a.checkpoint_dir,
            epochs:             a.epochs,
            batch_size:         a.batch_size,
            learning_rate:      a.learning_rate,
            patch_size:         a.patch_size,
            scale:              a.scale,
            residual_blocks:    a.residual_blocks,
            channels:           a.channels,
            perceptual:         a.perceptual,
            texture:            a.texture,
            texture_patch:      a.texture_patch,
            adversarial:        a.adversarial,
            adversarial_weight: a.adversarial_weight,
            pixel_weight:       a.pixel_weight,
            vgg_weights:        a.vgg_weights,
            val_fraction:       a.val_fraction,
            seed:               a.seed,
            num_workers:        a.num_workers,
            precompute_bicubic: a.precompute_bicubic,
            decode_limits:      DecodeLimits { max_alloc_mb: a.max_decode_mb, max_dimension: None },
            normalizer:         Normalizer::UNIT,
            backend:            a.backend,
        }
    }
}

/// All arguments for the `eval` command
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Directory of low-resolution evaluation images
    #[arg(long, default_value = "data/eval/lr")]
    pub lr_dir: String,

    /// Directory of high-resolution reference images (same filenames)
    #[arg(long, default_value = "data/eval/hr")]
    pub hr_dir: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Checkpoint epoch to load; the latest one if omitted
    #[arg(long)]
    pub epoch: Option<usize>,

    /// Write super-resolved images here as PNG
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Decoder allocation limit per image, in MiB
    #[arg(long, default_value_t = 512)]
    pub max_decode_mb: u64,

    /// Compute backend: wgpu (GPU) or ndarray (CPU)
    #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,
}

impl From<EvalArgs> for EvalConfig {
    fn from(a: EvalArgs) -> Self {
        EvalConfig {
            lr_dir:         a.lr_dir,
            hr_dir:         a.hr_dir,
            checkpoint_dir: a.checkpoint_dir,
            epoch:          a.epoch,
            output_dir:     a.output_dir,
            decode_limits:  DecodeLimits { max_alloc_mb: a.max_decode_mb, max_dimension: None },
            backend:        a.backend,
        }
    }
}
