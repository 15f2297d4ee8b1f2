//! Capture window geometry
//!
//! The scanner only looks at a centered sub-rectangle of each frame; the
//! rest of the frame is ignored by the decode pipeline.

use crate::config::RoiConfig;

/// A scan window inside a frame, in pixel coordinates.
///
/// Invariant for non-degenerate frames: `0 <= x0 < x1 <= width` and
/// `0 <= y0 < y1 <= height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl RoiRect {
    /// Window width in pixels
    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    /// Window height in pixels
    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }
}

/// Compute the centered scan window for a frame of the given size.
///
/// Pure function of the configured fractions; degenerate frame sizes yield
/// degenerate but well-formed rectangles.
pub fn compute_roi(width: u32, height: u32, config: &RoiConfig) -> RoiRect {
    let roi_h = (height as f32 * config.height_frac) as i32;
    let roi_w = (width as f32 * config.width_frac) as i32;
    let x0 = (width as i32 - roi_w) / 2;
    let y0 = (height as i32 - roi_h) / 2;
    RoiRect {
        x0,
        y0,
        x1: x0 + roi_w,
        y1: y0 + roi_h,
    }
}
