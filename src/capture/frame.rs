//! Frame data structures for captured camera content

use std::time::Instant;

use image::{DynamicImage, RgbaImage};

use crate::vision::roi::RoiRect;

/// A single captured frame from a camera or file source
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when the frame was captured
    pub timestamp: Instant,
}

impl Frame {
    /// Create a new frame from raw RGBA data
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Create a frame from a decoded image
    pub fn from_image(image: DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(rgba.into_raw(), width, height)
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Extract the pixels inside a rectangle as an owned RGBA image.
    ///
    /// The rectangle is clamped to the frame bounds, so a degenerate ROI
    /// yields a degenerate (possibly empty) crop rather than a panic.
    pub fn crop(&self, roi: &RoiRect) -> RgbaImage {
        let x0 = (roi.x0.max(0) as u32).min(self.width);
        let y0 = (roi.y0.max(0) as u32).min(self.height);
        let x1 = (roi.x1.max(0) as u32).min(self.width);
        let y1 = (roi.y1.max(0) as u32).min(self.height);

        let w = x1.saturating_sub(x0);
        let h = y1.saturating_sub(y0);

        let mut region = Vec::with_capacity((w * h * 4) as usize);
        for row in y0..y1 {
            let start = ((row * self.width + x0) * 4) as usize;
            let end = start + (w * 4) as usize;
            if end <= self.data.len() {
                region.extend_from_slice(&self.data[start..end]);
            }
        }

        RgbaImage::from_raw(w, h, region).unwrap_or_else(|| RgbaImage::new(0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = if (x + y) % 2 == 0 { 255u8 } else { 0u8 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        Frame::new(data, width, height)
    }

    #[test]
    fn test_crop_dimensions() {
        let frame = checker_frame(10, 8);
        let roi = RoiRect {
            x0: 1,
            y0: 2,
            x1: 9,
            y1: 6,
        };
        let crop = frame.crop(&roi);
        assert_eq!(crop.dimensions(), (8, 4));
    }

    #[test]
    fn test_crop_preserves_pixels() {
        let frame = checker_frame(4, 4);
        let roi = RoiRect {
            x0: 1,
            y0: 1,
            x1: 3,
            y1: 3,
        };
        let crop = frame.crop(&roi);
        // (1,1) in the frame is even parity -> white
        assert_eq!(crop.get_pixel(0, 0).0[0], 255);
        // (2,1) is odd parity -> black
        assert_eq!(crop.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn test_crop_clamps_out_of_bounds() {
        let frame = checker_frame(4, 4);
        let roi = RoiRect {
            x0: 2,
            y0: 2,
            x1: 100,
            y1: 100,
        };
        let crop = frame.crop(&roi);
        assert_eq!(crop.dimensions(), (2, 2));
    }
}
