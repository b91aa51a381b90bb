// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All networks, losses and loops built on the Burn framework.
//
//   generator.rs     — residual SR network, bicubic skip path
//   discriminator.rs — real/generated patch classifier
//   vgg.rs           — frozen VGG-19 trunk for feature losses
//   losses.rs        — pixel, perceptual, texture terms and the
//                      composer that sums them
//   adversarial.rs   — discriminator updates (BCE or least squares)
//   trainer.rs       — epoch loop, validation PSNR, checkpoints
//   evaluator.rs     — full-image inference and scoring

/// Residual super-resolution generator
pub mod generator;

/// Patch discriminator for the adversarial loss
pub mod discriminator;

/// VGG-19 feature extractor
pub mod vgg;

/// Loss terms and their weighted sum
pub mod losses;

/// Discriminator training and generator-side adversarial loss
pub mod adversarial;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Checkpoint evaluation with PSNR
pub mod evaluator;
