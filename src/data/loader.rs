// ============================================================
// Layer 4 — Paired Directory Loader
// ============================================================
// Discovers image pairs stored in two parallel directories:
//
//   <lr_dir>/0001.png   ↔   <hr_dir>/0001.png
//   <lr_dir>/0002.png   ↔   <hr_dir>/0002.png
//
// Pairs are matched by exact filename, never by listing position,
// so an extra or missing file on one side cannot shift every
// following pair. LR files with no HR counterpart are skipped
// with a warning. The result is sorted by filename.

use anyhow::{ensure, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::image_pair::ImagePair;
use crate::domain::traits::PairSource;

/// File extensions the decoder is built to read.
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Loads LR/HR pairs from two directories.
/// Implements the PairSource trait from Layer 3.
pub struct PairedDirSource {
    lr_dir: PathBuf,
    hr_dir: PathBuf,
}

impl PairedDirSource {
    pub fn new(lr_dir: impl Into<PathBuf>, hr_dir: impl Into<PathBuf>) -> Self {
        Self {
            lr_dir: lr_dir.into(),
            hr_dir: hr_dir.into(),
        }
    }
}

impl PairSource for PairedDirSource {
    fn load_pairs(&self) -> Result<Vec<ImagePair>> {
        let mut pairs = Vec::new();

        for entry in fs::read_dir(&self.lr_dir)
            .with_context(|| format!("Cannot read LR directory '{}'", self.lr_dir.display()))?
        {
            let entry = entry?;
            let path  = entry.path();

            if !path.is_file() || !is_image(&path) {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!("Skipping non UTF-8 filename '{}'", path.display());
                continue;
            };

            let hr_path = self.hr_dir.join(name);
            if !hr_path.is_file() {
                tracing::warn!(
                    "Skipping '{}': no matching file in '{}'",
                    name,
                    self.hr_dir.display()
                );
                continue;
            }

            pairs.push(ImagePair::new(name, path.clone(), hr_path));
        }

        ensure!(
            !pairs.is_empty(),
            "No image pairs found: '{}' and '{}' share no image filenames",
            self.lr_dir.display(),
            self.hr_dir.display()
        );
        pairs.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!(
            "Found {} image pairs in '{}' / '{}'",
            pairs.len(),
            self.lr_dir.display(),
            self.hr_dir.display()
        );
        Ok(pairs)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
