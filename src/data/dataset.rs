// ============================================================
// Layer 4 — Patch Dataset
// ============================================================
// Implements Burn's Dataset trait over image pairs. Every access
// decodes the pair, draws a fresh random window and returns the
// aligned, normalised LR/HR patches.
//
// The crop RNG is shared across DataLoader workers behind a
// Mutex. With one worker the crop sequence is fully determined
// by the seed.
//
// The optional precomputed baseline is produced by the generator's
// own bicubic operator on the NdArray backend, so training and
// inference add the network's output to the same upsample.

use anyhow::{anyhow, Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, NdArray},
    data::dataset::Dataset,
    prelude::*,
};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Mutex;

use crate::data::{
    crop::CropSampler,
    decoder::ImageDecoder,
    normalize::Normalizer,
};
use crate::domain::{crop_window::CropWindow, image_pair::ImagePair};
use crate::ml::generator::bicubic_upsample;

/// One sampled training example, planar CHW floats.
#[derive(Debug, Clone)]
pub struct PatchPair {
    /// LR patch — 3 × lr_size × lr_size values
    pub lr: Vec<f32>,
    /// HR patch — 3 × hr_size × hr_size values
    pub hr: Vec<f32>,
    /// Bicubic upsample of `lr`, same size as `hr`
    pub bicubic: Option<Vec<f32>>,
    pub lr_size: usize,
    pub hr_size: usize,
    /// Where the patch was cut from
    pub window: CropWindow,
}

/// Sampling options shared by the train and validation datasets.
#[derive(Debug, Clone, Copy)]
pub struct PatchOptions {
    pub patch_size:         u32,
    pub scale:              u32,
    pub seed:               u64,
    pub precompute_bicubic: bool,
    pub normalizer:         Normalizer,
    pub decoder:            ImageDecoder,
}

pub struct PatchDataset {
    pairs:              Vec<ImagePair>,
    sampler:            CropSampler,
    decoder:            ImageDecoder,
    normalizer:         Normalizer,
    precompute_bicubic: bool,
    rng:                Mutex<StdRng>,
}

impl PatchDataset {
    /// Build a dataset, checking every pair's header dimensions
    /// so that sampling cannot fail on size later.
    pub fn new(pairs: Vec<ImagePair>, opts: PatchOptions) -> Result<Self> {
        let sampler = CropSampler::new(opts.patch_size, opts.scale);

        for pair in &pairs {
            let lr = opts.decoder.dimensions(&pair.lr_path)?;
            let hr = opts.decoder.dimensions(&pair.hr_path)?;
            sampler
                .check_dims(lr, hr)
                .with_context(|| format!("Image pair '{}' cannot be cropped", pair.name))?;
        }

        Ok(Self {
            pairs,
            sampler,
            decoder: opts.decoder,
            normalizer: opts.normalizer,
            precompute_bicubic: opts.precompute_bicubic,
            rng: Mutex::new(StdRng::seed_from_u64(opts.seed)),
        })
    }

    /// Decode, crop and normalise the pair at `index`.
    pub fn sample(&self, index: usize) -> Result<PatchPair> {
        let pair = self
            .pairs
            .get(index)
            .ok_or_else(|| anyhow!("index {index} out of range ({} pairs)", self.pairs.len()))?;

        let lr_img = self.decoder.decode_rgb(&pair.lr_path)?;
        let hr_img = self.decoder.decode_rgb(&pair.hr_path)?;
        self.sampler
            .check_dims(lr_img.dimensions(), hr_img.dimensions())
            .with_context(|| format!("Image pair '{}' cannot be cropped", pair.name))?;

        let window = self.next_window(lr_img.dimensions())?;
        let (lr_crop, hr_crop) = self.sampler.crop_pair(&lr_img, &hr_img, window);

        let lr = self.normalizer.to_chw(&lr_crop);
        let bicubic = if self.precompute_bicubic {
            Some(baseline(&lr, window)?)
        } else {
            None
        };

        tracing::debug!("Sampled '{}' at {:?}", pair.name, window);

        Ok(PatchPair {
            lr,
            hr: self.normalizer.to_chw(&hr_crop),
            bicubic,
            lr_size: window.size as usize,
            hr_size: window.hr_size() as usize,
            window,
        })
    }

    fn next_window(&self, lr_dims: (u32, u32)) -> Result<CropWindow> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow!("crop RNG lock poisoned"))?;
        self.sampler.random_window(&mut *rng, lr_dims)
    }
}

/// Upsample a normalised LR patch on the CPU.
fn baseline(lr: &[f32], window: CropWindow) -> Result<Vec<f32>> {
    let size = window.size as usize;
    let x = Tensor::<NdArray, 4>::from_data(
        TensorData::new(lr.to_vec(), [1, 3, size, size]),
        &NdArrayDevice::default(),
    );
    bicubic_upsample(x, window.scale as usize)
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}

// The DataLoader stops a partition at the first `None`, so a pair that
// fails to decode is replaced by the next readable one instead.
impl Dataset<PatchPair> for PatchDataset {
    fn get(&self, index: usize) -> Option<PatchPair> {
        let len = self.pairs.len();
        if index >= len {
            return None;
        }
        for offset in 0..len {
            let i = (index + offset) % len;
            match self.sample(i) {
                Ok(patch) => return Some(patch),
                Err(e) => tracing::error!("Failed to sample pair {}: {:#}", i, e),
            }
        }
        tracing::error!("No pair in the dataset could be sampled");
        None
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}
