// ============================================================
// Layer 4 — Patch Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<PatchPair>
// into image tensors.
//
// How batching works here:
//   Input:  N PatchPairs, each a planar 3 × S × S buffer
//   Output: SrBatch with tensors of shape [N, 3, S, S]
//
//   All patches share one size, so the buffers are concatenated
//   into one long Vec and reshaped in a single step.

use anyhow::{anyhow, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use image::RgbImage;

use crate::data::{dataset::PatchPair, normalize::Normalizer};

/// A batch of aligned patches ready for the generator.
#[derive(Debug, Clone)]
pub struct SrBatch<B: Backend> {
    /// LR patches — [batch, 3, lr, lr]
    pub lr: Tensor<B, 4>,

    /// HR ground truth — [batch, 3, hr, hr]
    pub hr: Tensor<B, 4>,

    /// Precomputed bicubic upsample of `lr` — [batch, 3, hr, hr].
    /// Present only if every patch in the batch carries one.
    pub bicubic: Option<Tensor<B, 4>>,
}

#[derive(Clone, Debug)]
pub struct SrBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SrBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<PatchPair, SrBatch<B>> for SrBatcher<B> {
    fn batch(&self, items: Vec<PatchPair>) -> SrBatch<B> {
        let lr = stack_planes::<B>(items.iter().map(|p| p.lr.as_slice()), items[0].lr_size, &self.device);
        let hr = stack_planes::<B>(items.iter().map(|p| p.hr.as_slice()), items[0].hr_size, &self.device);

        let bicubic = items
            .iter()
            .map(|p| p.bicubic.as_deref())
            .collect::<Option<Vec<&[f32]>>>()
            .map(|planes| stack_planes::<B>(planes.into_iter(), items[0].hr_size, &self.device));

        SrBatch { lr, hr, bicubic }
    }
}

/// Concatenate square planar buffers into one [N, 3, size, size] tensor.
fn stack_planes<'a, B: Backend>(
    planes: impl Iterator<Item = &'a [f32]>,
    size:   usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let flat: Vec<f32> = planes.flat_map(|p| p.iter().copied()).collect();
    let n = flat.len() / (3 * size * size);
    Tensor::from_data(TensorData::new(flat, [n, 3, size, size]), device)
}

/// Whole image → [1, 3, H, W] tensor.
pub fn image_to_tensor<B: Backend>(
    img:        &RgbImage,
    normalizer: &Normalizer,
    device:     &B::Device,
) -> Tensor<B, 4> {
    let (w, h) = img.dimensions();
    let values = normalizer.to_chw(img);
    Tensor::from_data(TensorData::new(values, [1, 3, h as usize, w as usize]), device)
}

/// [1, 3, H, W] tensor → image, undoing normalisation.
pub fn tensor_to_image<B: Backend>(
    tensor:     Tensor<B, 4>,
    normalizer: &Normalizer,
) -> Result<RgbImage> {
    let [n, c, h, w] = tensor.dims();
    if n != 1 || c != 3 {
        return Err(anyhow!("expected a [1, 3, H, W] tensor, got [{n}, {c}, {h}, {w}]"));
    }
    let values: Vec<f32> = tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))?;
    normalizer.from_chw(&values, w as u32, h as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::crop_window::CropWindow;
    use burn::backend::NdArray;
    use image::Rgb;

    fn patch(value: f32, with_bicubic: bool) -> PatchPair {
        PatchPair {
            lr: vec![value; 3 * 2 * 2],
            hr: vec![value; 3 * 4 * 4],
            bicubic: with_bicubic.then(|| vec![value; 3 * 4 * 4]),
            lr_size: 2,
            hr_size: 4,
            window: CropWindow::new(0, 0, 2, 2),
        }
    }

    #[test]
    fn test_batch_shapes_and_order() {
        let batcher = SrBatcher::<NdArray>::new(Default::default());
        let batch   = batcher.batch(vec![patch(0.1, true), patch(0.9, true)]);

        assert_eq!(batch.lr.dims(), [2, 3, 2, 2]);
        assert_eq!(batch.hr.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.bicubic.as_ref().map(|b| b.dims()), Some([2, 3, 4, 4]));

        let lr: Vec<f32> = batch.lr.into_data().to_vec().unwrap();
        assert!((lr[0] - 0.1).abs() < 1e-6);
        assert!((lr[lr.len() - 1] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_bicubic_dropped_if_any_patch_lacks_it() {
        let batcher = SrBatcher::<NdArray>::new(Default::default());
        let batch   = batcher.batch(vec![patch(0.1, true), patch(0.2, false)]);
        assert!(batch.bicubic.is_none());
    }

    #[test]
    fn test_image_tensor_round_trip() {
        let img = RgbImage::from_fn(5, 3, |x, y| Rgb([(x * 50) as u8, (y * 80) as u8, 7]));
        let t   = image_to_tensor::<NdArray>(&img, &Normalizer::UNIT, &Default::default());
        assert_eq!(t.dims(), [1, 3, 3, 5]);

        let back = tensor_to_image(t, &Normalizer::UNIT).unwrap();
        assert_eq!(back, img);
    }
}
