// ============================================================
// Layer 4 — Channel Normaliser
// ============================================================
// Converts between 8-bit RGB images and planar (CHW) float data:
//
//   value = (pixel / 255 - mean[c]) / std[c]
//
// The default normaliser has mean 0 and std 1, which keeps pixels
// in [0, 1]. PSNR and the VGG feature extractor both work on
// [0, 1] pixels, so tensors are mapped back with
// `denormalize_tensor` before either sees them.

use anyhow::{ensure, Result};
use burn::prelude::*;
use image::RgbImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub mean: [f32; 3],
    pub std:  [f32; 3],
}

impl Normalizer {
    /// Statistics of the ImageNet training set, expected by VGG.
    pub const IMAGENET: Normalizer = Normalizer {
        mean: [0.485, 0.456, 0.406],
        std:  [0.229, 0.224, 0.225],
    };

    /// Plain [0, 1] scaling.
    pub const UNIT: Normalizer = Normalizer {
        mean: [0.0, 0.0, 0.0],
        std:  [1.0, 1.0, 1.0],
    };

    pub fn is_unit(&self) -> bool {
        *self == Self::UNIT
    }

    /// Planar CHW floats, channel-major then row-major.
    pub fn to_chw(&self, img: &RgbImage) -> Vec<f32> {
        let (w, h) = img.dimensions();
        let plane  = (w as usize) * (h as usize);
        let mut out = vec![0.0f32; 3 * plane];

        for (i, px) in img.pixels().enumerate() {
            for c in 0..3 {
                out[c * plane + i] = (px[c] as f32 / 255.0 - self.mean[c]) / self.std[c];
            }
        }
        out
    }

    /// Inverse of `to_chw`; values are clamped to the 8-bit range.
    pub fn from_chw(&self, values: &[f32], width: u32, height: u32) -> Result<RgbImage> {
        let plane = (width as usize) * (height as usize);
        ensure!(
            values.len() == 3 * plane,
            "expected {} values for a {}x{} RGB image, got {}",
            3 * plane,
            width,
            height,
            values.len()
        );

        let mut img = RgbImage::new(width, height);
        for (i, px) in img.pixels_mut().enumerate() {
            for c in 0..3 {
                let v = values[c * plane + i] * self.std[c] + self.mean[c];
                px[c] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
        Ok(img)
    }

    /// [0, 1] pixels → normalised, for a [N, 3, H, W] tensor.
    pub fn normalize_tensor<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.is_unit() {
            return x;
        }
        let (mean, std) = self.channel_tensors::<B>(&x.device());
        (x - mean) / std
    }

    /// Normalised → [0, 1] pixels, for a [N, 3, H, W] tensor.
    pub fn denormalize_tensor<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.is_unit() {
            return x;
        }
        let (mean, std) = self.channel_tensors::<B>(&x.device());
        x * std + mean
    }

    fn channel_tensors<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let mean = Tensor::<B, 1>::from_floats(self.mean, device).reshape([1, 3, 1, 1]);
        let std  = Tensor::<B, 1>::from_floats(self.std, device).reshape([1, 3, 1, 1]);
        (mean, std)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::UNIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::Rgb;

    #[test]
    fn test_to_chw_is_planar() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 51]));

        let chw = Normalizer::UNIT.to_chw(&img);
        assert_eq!(chw, vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.2]);
    }

    #[test]
    fn test_from_chw_inverts_imagenet_normalisation() {
        let mut img = RgbImage::new(3, 2);
        for (i, px) in img.pixels_mut().enumerate() {
            *px = Rgb([(i * 40) as u8, 128, 255 - (i * 30) as u8]);
        }

        let norm = Normalizer::IMAGENET;
        let back = norm.from_chw(&norm.to_chw(&img), 3, 2).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn test_from_chw_rejects_wrong_length() {
        assert!(Normalizer::UNIT.from_chw(&[0.0; 5], 1, 2).is_err());
    }

    #[test]
    fn test_tensor_round_trip() {
        let device = Default::default();
        let x = Tensor::<NdArray, 4>::full([1, 3, 2, 2], 0.5, &device);
        let norm = Normalizer::IMAGENET;

        let n = norm.normalize_tensor(x.clone());
        let first: Vec<f32> = n.clone().into_data().to_vec().unwrap();
        assert!((first[0] - (0.5 - 0.485) / 0.229).abs() < 1e-5);

        let back: Vec<f32> = norm.denormalize_tensor(n).into_data().to_vec().unwrap();
        assert!(back.iter().all(|v| (v - 0.5).abs() < 1e-5));
    }
}
