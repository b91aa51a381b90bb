// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between image files on disk and tensor batches.
//
// The pipeline flows in this order:
//
//   lr/*.png  hr/*.png
//       │
//       ▼
//   PairedDirSource   → matches LR and HR files by filename
//       │
//       ▼
//   split_train_val   → seeded train / validation split
//       │
//       ▼
//   PatchDataset      → decodes, crops aligned patches, normalises
//       │              (ImageDecoder, CropSampler, Normalizer)
//       ▼
//   SrBatcher         → stacks patches into [N, 3, H, W] tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop

/// Finds LR/HR pairs in two directories
pub mod loader;

/// Decodes image files with explicit allocation limits
pub mod decoder;

/// Channel mean / standard deviation normalisation
pub mod normalize;

/// Random aligned crops at both resolutions
pub mod crop;

/// Implements Burn's Dataset trait for patch pairs
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
