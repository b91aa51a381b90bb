// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the
// other layers:
//
//   checkpoint.rs  — Network weights (CompactRecorder), the
//                    latest-epoch pointer and the training config
//                    needed to rebuild the generator for eval.
//
//   metrics.rs     — Epoch-level loss / PSNR rows in a CSV file.
//
//   image_store.rs — PNG output of super-resolved images.

/// Network checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// PNG writer for evaluation outputs
pub mod image_store;
