// ============================================================
// Layer 4 — Aligned Patch Cropper
// ============================================================
// Picks a random square window in the LR image and cuts the same
// region out of the HR image:
//
//   LR offset  x ∈ [0, w_lr - patch],  y ∈ [0, h_lr - patch]
//   HR window  (x * scale, y * scale, patch * scale)
//
// The random source is passed in by the caller, so a seeded RNG
// yields a reproducible sequence of windows.

use anyhow::{ensure, Result};
use image::{imageops, RgbImage};
use rand::Rng;

use crate::domain::crop_window::CropWindow;

#[derive(Debug, Clone, Copy)]
pub struct CropSampler {
    /// LR patch edge length in pixels
    patch: u32,
    /// Upsampling factor
    scale: u32,
}

impl CropSampler {
    /// # Panics
    /// Panics if `patch` or `scale` is zero.
    pub fn new(patch: u32, scale: u32) -> Self {
        assert!(patch > 0, "patch size must be positive");
        assert!(scale > 0, "scale factor must be positive");
        Self { patch, scale }
    }

    /// Check that a pair of image sizes can supply aligned patches.
    pub fn check_dims(&self, lr: (u32, u32), hr: (u32, u32)) -> Result<()> {
        ensure!(
            lr.0 >= self.patch && lr.1 >= self.patch,
            "LR image {}x{} is smaller than the {}px patch",
            lr.0,
            lr.1,
            self.patch
        );
        ensure!(
            hr.0 >= lr.0 * self.scale && hr.1 >= lr.1 * self.scale,
            "HR image {}x{} is smaller than LR {}x{} at scale {}",
            hr.0,
            hr.1,
            lr.0,
            lr.1,
            self.scale
        );
        Ok(())
    }

    /// Draw a random window inside an LR image of the given size.
    pub fn random_window<R: Rng + ?Sized>(&self, rng: &mut R, lr: (u32, u32)) -> Result<CropWindow> {
        let (w, h) = lr;
        ensure!(
            w >= self.patch && h >= self.patch,
            "LR image {}x{} is smaller than the {}px patch",
            w,
            h,
            self.patch
        );
        let x = rng.gen_range(0..=w - self.patch);
        let y = rng.gen_range(0..=h - self.patch);
        Ok(CropWindow::new(x, y, self.patch, self.scale))
    }

    /// Cut the window out of both images.
    pub fn crop_pair(&self, lr: &RgbImage, hr: &RgbImage, window: CropWindow) -> (RgbImage, RgbImage) {
        let lr_crop = imageops::crop_imm(lr, window.x, window.y, window.size, window.size).to_image();
        let (hx, hy, hs) = window.hr_rect();
        let hr_crop = imageops::crop_imm(hr, hx, hy, hs, hs).to_image();
        (lr_crop, hr_crop)
    }
}
