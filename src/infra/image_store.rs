// ============================================================
// Layer 6 — Output Image Store
// ============================================================
// Writes super-resolved images as PNG, one file per input,
// named after the input's stem.

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `img` as `{stem}.png` and return the written path.
    pub fn save(&self, stem: &str, img: &RgbImage) -> Result<PathBuf> {
        let path = self.dir.join(format!("{stem}.png"));
        img.save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(path)
    }
}
