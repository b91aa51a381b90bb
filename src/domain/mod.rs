// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the system works
// with: paired images, crop windows and image-quality scores.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file decoding or tensor code
//   - Only plain Rust structs, enums, functions and traits

// A low/high-resolution image pair matched by filename
pub mod image_pair;

// A crop window shared by both resolutions
pub mod crop_window;

// PSNR and MSE helpers
pub mod quality;

// Core abstractions (traits) that other layers implement
pub mod traits;
