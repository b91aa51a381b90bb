// ============================================================
// Layer 3 — ImagePair Domain Type
// ============================================================
// One training or evaluation example: the same picture stored
// twice, once at low resolution and once at high resolution.
//
// The two files live in parallel directories and share a
// filename, e.g.
//   data/lr/0001.png  ↔  data/hr/0001.png

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A low/high-resolution image pair associated by filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePair {
    /// Shared filename, e.g. "0001.png"
    pub name: String,

    /// Path of the low-resolution image
    pub lr_path: PathBuf,

    /// Path of the high-resolution image
    pub hr_path: PathBuf,
}

impl ImagePair {
    pub fn new(
        name:    impl Into<String>,
        lr_path: impl Into<PathBuf>,
        hr_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name:    name.into(),
            lr_path: lr_path.into(),
            hr_path: hr_path.into(),
        }
    }

    /// File stem of the pair, used to name generated outputs.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}
