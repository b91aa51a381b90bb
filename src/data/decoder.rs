// ============================================================
// Layer 4 — Image Decoder
// ============================================================
// Reads image files into 8-bit RGB buffers.
//
// Decoder limits are an explicit value handed to each decoder
// instead of a process-wide setting, so two decoders in the same
// process can use different limits.

use anyhow::{Context, Result};
use image::{
    io::{Limits, Reader as ImageReader},
    RgbImage,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bounds applied while decoding one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeLimits {
    /// Maximum decoder allocation in MiB
    pub max_alloc_mb: u64,
    /// Maximum width and height in pixels, unbounded if None
    pub max_dimension: Option<u32>,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self { max_alloc_mb: 512, max_dimension: None }
    }
}

impl DecodeLimits {
    fn to_image_limits(self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc        = Some(self.max_alloc_mb.saturating_mul(1024 * 1024));
        limits.max_image_width  = self.max_dimension;
        limits.max_image_height = self.max_dimension;
        limits
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder {
    limits: DecodeLimits,
}

impl ImageDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    /// Decode a file into RGB8, whatever its stored colour type.
    pub fn decode_rgb(&self, path: &Path) -> Result<RgbImage> {
        let mut reader = ImageReader::open(path)
            .with_context(|| format!("Cannot open image '{}'", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("Cannot detect format of '{}'", path.display()))?;
        reader.limits(self.limits.to_image_limits());

        let img = reader
            .decode()
            .with_context(|| format!("Cannot decode image '{}'", path.display()))?;
        Ok(img.to_rgb8())
    }

    /// Read only the header to get (width, height).
    pub fn dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        ImageReader::open(path)
            .with_context(|| format!("Cannot open image '{}'", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("Cannot detect format of '{}'", path.display()))?
            .into_dimensions()
            .with_context(|| format!("Cannot read dimensions of '{}'", path.display()))
    }
}
