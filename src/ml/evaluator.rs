// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Full-image inference with a trained generator.
//
// For every LR/HR pair:
//   1. decode both images
//   2. super-resolve the whole LR image
//   3. MSE / PSNR against the HR image on [0, 1] pixels
//   4. optionally write the output as PNG
//
// The HR image may be a few pixels larger than LR × scale; it is
// compared on its top-left (w·s, h·s) region.

use anyhow::{anyhow, ensure, Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};
use image::imageops;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{image_to_tensor, tensor_to_image},
    decoder::ImageDecoder,
    normalize::Normalizer,
};
use crate::domain::{image_pair::ImagePair, quality};
use crate::infra::{
    checkpoint::{CheckpointManager, GENERATOR},
    image_store::ImageStore,
};
use crate::ml::{generator::Generator, trainer::BackendKind};

/// Score of one evaluated image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageScore {
    pub name: String,
    pub mse:  f64,
    pub psnr: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EvalReport {
    pub epoch:  usize,
    pub scores: Vec<ImageScore>,
}

impl EvalReport {
    pub fn mean_mse(&self) -> Option<f64> {
        quality::mean(&self.scores.iter().map(|s| s.mse).collect::<Vec<_>>())
    }

    /// Arithmetic mean of per-image PSNR.
    pub fn mean_psnr(&self) -> Option<f64> {
        quality::mean(&self.scores.iter().map(|s| s.psnr).collect::<Vec<_>>())
    }
}

pub struct Evaluator<B: Backend> {
    generator:  Generator<B>,
    normalizer: Normalizer,
    decoder:    ImageDecoder,
    device:     B::Device,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(generator: Generator<B>, normalizer: Normalizer, decoder: ImageDecoder, device: B::Device) -> Self {
        Self { generator, normalizer, decoder, device }
    }

    /// Rebuild the generator described by `train_cfg` and load its
    /// weights for `epoch`.
    pub fn from_checkpoint(
        ckpt:      &CheckpointManager,
        train_cfg: &TrainConfig,
        epoch:     usize,
        decoder:   ImageDecoder,
        device:    B::Device,
    ) -> Result<Self> {
        let generator = train_cfg.generator_config().init::<B>(&device);
        let generator = ckpt.load_module(GENERATOR, generator, epoch, &device)?;
        Ok(Self::new(generator, train_cfg.normalizer, decoder, device))
    }

    /// Super-resolve one pair; returns the score and the output image.
    pub fn evaluate_pair(&self, pair: &ImagePair) -> Result<(ImageScore, image::RgbImage)> {
        let lr = self.decoder.decode_rgb(&pair.lr_path)?;
        let hr = self.decoder.decode_rgb(&pair.hr_path)?;

        let scale = self.generator.scale_factor() as u32;
        let (w, h) = (lr.width() * scale, lr.height() * scale);
        ensure!(
            hr.width() >= w && hr.height() >= h,
            "HR image of '{}' is {}x{}, smaller than LR x{} = {}x{}",
            pair.name, hr.width(), hr.height(), scale, w, h
        );
        let hr = imageops::crop_imm(&hr, 0, 0, w, h).to_image();

        let input  = image_to_tensor::<B>(&lr, &self.normalizer, &self.device);
        let output = self.generator.forward(input);

        let pixels: Vec<f32> = self
            .normalizer
            .denormalize_tensor(output.clone())
            .clamp(0.0, 1.0)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))?;
        let target = Normalizer::UNIT.to_chw(&hr);
        let mse = quality::mse(&pixels, &target)
            .ok_or_else(|| anyhow!("Output of '{}' does not match the HR size", pair.name))?;

        let score = ImageScore {
            name: pair.name.clone(),
            mse,
            psnr: quality::psnr(mse),
        };
        let image = tensor_to_image(output, &self.normalizer)?;
        Ok((score, image))
    }

    /// Evaluate every pair, printing one line per image.
    pub fn evaluate_all(
        &self,
        pairs: &[ImagePair],
        store: Option<&ImageStore>,
        epoch: usize,
    ) -> Result<EvalReport> {
        let mut report = EvalReport { epoch, scores: Vec::with_capacity(pairs.len()) };

        for pair in pairs {
            let (score, image) = self
                .evaluate_pair(pair)
                .with_context(|| format!("Evaluation failed for '{}'", pair.name))?;

            println!("PSNR for {:<24} {:>8.3} dB  (MSE {:.6})", pair.name, score.psnr, score.mse);

            if let Some(store) = store {
                store.save(pair.stem(), &image)?;
            }
            report.scores.push(score);
        }
        Ok(report)
    }
}

/// Load the generator on the configured backend and evaluate `pairs`.
pub fn run_evaluation(
    backend:   BackendKind,
    ckpt:      &CheckpointManager,
    train_cfg: &TrainConfig,
    epoch:     usize,
    decoder:   ImageDecoder,
    pairs:     &[ImagePair],
    store:     Option<&ImageStore>,
) -> Result<EvalReport> {
    match backend {
        BackendKind::Wgpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            Evaluator::<Wgpu>::from_checkpoint(ckpt, train_cfg, epoch, decoder, device)?
                .evaluate_all(pairs, store, epoch)
        }
        BackendKind::Ndarray => {
            let device = NdArrayDevice::default();
            tracing::info!("Using NdArray device: {:?}", device);
            Evaluator::<NdArray>::from_checkpoint(ckpt, train_cfg, epoch, decoder, device)?
                .evaluate_all(pairs, store, epoch)
        }
    }
}
