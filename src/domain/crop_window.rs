// ============================================================
// Layer 3 — CropWindow Domain Type
// ============================================================
// A square crop expressed in low-resolution pixel coordinates.
// The matching high-resolution window is the same region scaled
// by the upsampling factor, which keeps both crops aligned:
//
//   LR:  (x,     y,     size)
//   HR:  (x * s, y * s, size * s)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    /// Left edge in LR pixels
    pub x: u32,
    /// Top edge in LR pixels
    pub y: u32,
    /// Edge length in LR pixels
    pub size: u32,
    /// Integer upsampling factor between LR and HR
    pub scale: u32,
}

impl CropWindow {
    pub fn new(x: u32, y: u32, size: u32, scale: u32) -> Self {
        Self { x, y, size, scale }
    }

    /// The aligned window in HR pixels as (x, y, size).
    pub fn hr_rect(&self) -> (u32, u32, u32) {
        (self.x * self.scale, self.y * self.scale, self.size * self.scale)
    }

    pub fn hr_size(&self) -> u32 {
        self.size * self.scale
    }
}
