// ============================================================
// Layer 3 — Image Quality Metrics
// ============================================================
// PSNR (peak signal-to-noise ratio) in decibels:
//
//   PSNR = 10 * log10(peak² / MSE)
//
// Pixel values are in [0, 1], so peak = 1 and the formula is
// 10 * log10(1 / MSE). This is the only PSNR used in the crate.
//
// Zero error has no finite PSNR: psnr(0.0) is +∞ and callers
// must be ready for it.

/// Peak pixel value of normalised images.
pub const PEAK: f64 = 1.0;

/// PSNR in dB for an MSE measured on [0, 1] pixels.
///
/// Returns `f64::INFINITY` for a zero error and `NaN` for a
/// negative or NaN error.
pub fn psnr(mse: f64) -> f64 {
    if mse.is_nan() || mse < 0.0 {
        return f64::NAN;
    }
    if mse == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (PEAK * PEAK / mse).log10()
}

/// Mean squared error between two equally sized buffers.
/// Returns `None` if the lengths differ or both are empty.
pub fn mse(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();
    Some(sum / a.len() as f64)
}

/// Arithmetic mean of per-image scores. An infinite entry makes
/// the mean infinite.
pub fn mean(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}
