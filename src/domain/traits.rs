// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer only talks to these traits, so the
// directory-based loader can be swapped for another source
// (an archive, a manifest file) without touching the use cases.

use anyhow::Result;

use crate::domain::image_pair::ImagePair;

// ─── PairSource ───────────────────────────────────────────────────────────────
/// Any component that can enumerate low/high-resolution image pairs.
///
/// Implementations:
///   - PairedDirSource → two directories with matching filenames
pub trait PairSource {
    /// Return every available pair, in a deterministic order.
    fn load_pairs(&self) -> Result<Vec<ImagePair>>;
}
