// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam.
//
// Per batch:
//   G(lr) → [D update] → pixel + perceptual + texture + adversarial
//         → backward → Adam step on G
//
// Per epoch:
//   validation PSNR on held-out patches, checkpoint, CSV row.
//
// Training runs on Autodiff<Wgpu> or Autodiff<NdArray>;
// generator.valid() drops to the inner backend for validation.

use anyhow::{anyhow, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::SrBatcher, dataset::PatchDataset, normalize::Normalizer};
use crate::domain::quality;
use crate::infra::{
    checkpoint::{CheckpointManager, DISCRIMINATOR, GENERATOR},
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    adversarial::{AdversarialStats, AdversarialTrainer},
    discriminator::{Discriminator, DiscriminatorConfig},
    generator::Generator,
    losses::{pixel_loss, scalar, LossComposer},
    vgg::{Vgg19, Vgg19Config},
};

/// Compute backend for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Wgpu,
    Ndarray,
}

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: PatchDataset,
    val_dataset:   PatchDataset,
    ckpt_manager:  CheckpointManager,
    metrics:       MetricsLogger,
) -> Result<()> {
    match cfg.backend {
        BackendKind::Wgpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            train_loop::<Autodiff<Wgpu>>(cfg, train_dataset, val_dataset, ckpt_manager, metrics, device)
        }
        BackendKind::Ndarray => {
            let device = NdArrayDevice::default();
            tracing::info!("Using NdArray device: {:?}", device);
            train_loop::<Autodiff<NdArray>>(cfg, train_dataset, val_dataset, ckpt_manager, metrics, device)
        }
    }
}

/// Running sums of the per-batch loss terms.
#[derive(Default)]
struct EpochTotals {
    batches:     usize,
    total:       f64,
    pixel:       f64,
    perceptual:  f64,
    texture:     f64,
    adversarial: f64,
    loss_d:      f64,
    d_real:      f64,
    d_fake:      f64,
}

impl EpochTotals {
    fn mean(&self, sum: f64) -> f64 {
        if self.batches > 0 { sum / self.batches as f64 } else { f64::NAN }
    }

    fn add_adversarial(&mut self, stats: &AdversarialStats) {
        self.loss_d += stats.loss_d;
        self.d_real += stats.d_real;
        self.d_fake += stats.d_fake;
    }
}

fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: PatchDataset,
    val_dataset:   PatchDataset,
    ckpt_manager:  CheckpointManager,
    metrics:       MetricsLogger,
    device:        B::Device,
) -> Result<()> {
    B::seed(cfg.seed);

    // ── Build networks ────────────────────────────────────────────────────────
    let mut generator: Generator<B> = cfg.generator_config().init(&device);
    tracing::info!(
        "Generator ready: {} residual blocks, {} channels, x{}",
        cfg.residual_blocks, cfg.channels, cfg.scale,
    );

    let vgg: Option<Vgg19<B>> = match &cfg.vgg_weights {
        Some(path) => Some(Vgg19Config::new().load_pretrained(path, &device)?),
        None => None,
    };
    let composer = LossComposer::new(cfg.loss_weights(), cfg.normalizer, vgg)?;

    let mut adversarial = cfg.adversarial.is_enabled().then(|| {
        let discriminator: Discriminator<B> = DiscriminatorConfig::new().init(&device);
        AdversarialTrainer::new(
            discriminator,
            AdamConfig::new().init::<B, Discriminator<B>>(),
            cfg.learning_rate,
            cfg.adversarial,
            cfg.texture,
            cfg.seed,
        )
    });

    let mut optim = AdamConfig::new().init::<B, Generator<B>>();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(SrBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train_dataset);

    // validation runs on the inner backend: no autodiff graph
    let val_loader = DataLoaderBuilder::new(SrBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers)
        .build(val_dataset);

    let mut best_psnr = f64::NEG_INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let mut totals = EpochTotals::default();

        for batch in train_loader.iter() {
            let generated = generator.forward_with_baseline(batch.lr, batch.bicubic);

            let adv = adversarial
                .as_mut()
                .and_then(|a| a.step(generated.clone(), batch.hr.clone()));
            let adv_loss = adv.map(|out| {
                totals.add_adversarial(&out.stats);
                out.loss_g
            });

            let loss = composer.compose(generated, batch.hr, adv_loss);
            totals.batches     += 1;
            totals.total       += scalar(&loss.total);
            totals.pixel       += loss.pixel;
            totals.perceptual  += loss.perceptual;
            totals.texture     += loss.texture;
            totals.adversarial += loss.adversarial;

            let grads = GradientsParams::from_grads(loss.total.backward(), &generator);
            generator = optim.step(cfg.learning_rate, generator, grads);
        }

        if totals.batches == 0 {
            tracing::warn!("Epoch {} produced no training batches", epoch);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let generator_valid = generator.valid();
        let mut val_loss_sum = 0.0f64;
        let mut val_batches  = 0usize;
        let mut psnrs: Vec<f64> = Vec::new();

        for batch in val_loader.iter() {
            let output = generator_valid.forward_with_baseline(batch.lr, batch.bicubic);
            val_loss_sum += scalar(&pixel_loss(output.clone(), batch.hr.clone()));
            val_batches  += 1;
            psnrs.extend(batch_psnr(output, batch.hr, &cfg.normalizer)?);
        }

        let row = EpochMetrics {
            epoch,
            train_loss:  totals.mean(totals.total),
            pixel:       totals.mean(totals.pixel),
            perceptual:  totals.mean(totals.perceptual),
            texture:     totals.mean(totals.texture),
            adversarial: totals.mean(totals.adversarial),
            loss_d:      totals.mean(totals.loss_d),
            d_real:      totals.mean(totals.d_real),
            d_fake:      totals.mean(totals.d_fake),
            val_loss:    if val_batches > 0 { val_loss_sum / val_batches as f64 } else { f64::NAN },
            val_psnr:    quality::mean(&psnrs).unwrap_or(f64::NAN),
        };

        println!(
            "Epoch {:>3}/{} | loss={:.5} | pixel={:.5} | perceptual={:.5} | texture={:.5} | adv={:.4} | val_psnr={:.2} dB",
            epoch, cfg.epochs, row.train_loss, row.pixel, row.perceptual,
            row.texture, row.adversarial, row.val_psnr,
        );
        if adversarial.is_some() {
            println!(
                "          | loss_d={:.4} | D(x)={:.3} | D(G(z))={:.3}",
                row.loss_d, row.d_real, row.d_fake,
            );
        }

        if row.is_improvement(best_psnr) {
            best_psnr = row.val_psnr;
            tracing::info!("New best validation PSNR: {:.2} dB", best_psnr);
        }
        metrics.log(&row)?;

        ckpt_manager.save_module(GENERATOR, &generator, epoch)?;
        if let Some(adv) = &adversarial {
            ckpt_manager.save_module(DISCRIMINATOR, adv.discriminator(), epoch)?;
        }
        ckpt_manager.mark_latest(epoch)?;
        tracing::info!("Checkpoint saved for epoch {} in '{}'", epoch, ckpt_manager.dir().display());
    }

    tracing::info!("Training complete! Metrics in '{}'", metrics.csv_path().display());
    Ok(())
}

/// Per-image PSNR of a batch, computed on [0, 1] pixels.
pub(crate) fn batch_psnr<B: Backend>(
    output:     Tensor<B, 4>,
    target:     Tensor<B, 4>,
    normalizer: &Normalizer,
) -> Result<Vec<f64>> {
    let output = normalizer.denormalize_tensor(output).clamp(0.0, 1.0);
    let target = normalizer.denormalize_tensor(target);

    let per_image: Vec<f32> = (output - target)
        .powf_scalar(2.0)
        .flatten::<2>(1, 3)
        .mean_dim(1)
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))?;

    Ok(per_image.into_iter().map(|mse| quality::psnr(mse as f64)).collect())
}
