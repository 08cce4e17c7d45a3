// Working-resolution planning for the Kontext pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel budget Flux models are tuned for (~1 megapixel)
pub const DEFAULT_TARGET_PIXELS: u64 = 1024 * 1024;

/// Both sides of a planned resolution are multiples of this
pub const ALIGNMENT: u32 = 16;

/// Image width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Compute the resolution the model should run at for an input of
/// `width` x `height`.
///
/// The result keeps the input aspect ratio, lands close to `target_pixels`
/// and has both sides aligned to [`ALIGNMENT`]. Height is derived first and
/// width from the snapped height. Snapping rounds half to even on both axes;
/// a side that would snap to zero is clamped to one alignment step.
pub fn plan(width: u32, height: u32, target_pixels: u64) -> Dimensions {
    let aspect = width.max(1) as f64 / height.max(1) as f64;

    let raw_height = (target_pixels as f64 / aspect).sqrt();
    let new_height = snap(raw_height);
    let new_width = snap(new_height as f64 * aspect);

    Dimensions {
        width: new_width,
        height: new_height,
    }
}

fn snap(value: f64) -> u32 {
    let step = ALIGNMENT as f64;
    let snapped = (value / step).round_ties_even() * step;
    (snapped as u32).max(ALIGNMENT)
}
