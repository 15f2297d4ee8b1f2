//! Image variants for the decode cascade
//!
//! Builds the fixed, ordered list of enhanced/binarized renditions of a
//! grayscale crop that the barcode decoder is tried against. Blurry or
//! low-contrast card photos often fail on the raw crop but decode cleanly
//! on one of these variants.

use image::{imageops, GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};

use crate::config::EnhanceConfig;

/// One named image variant for the decode loop
pub type Variant = (&'static str, GrayImage);

/// Build the full variant list in decode order.
///
/// The order matters: the decode cascade short-circuits on the first variant
/// that yields a symbol.
pub fn build_variants(gray: &GrayImage, config: &EnhanceConfig) -> Vec<Variant> {
    let enhanced = clahe(gray, config.clahe_clip, config.clahe_tile);
    let sharp = unsharp_mask(&enhanced, config.unsharp_amount, config.unsharp_sigma);

    // Kernel dimensions are forced odd so the close stays centered.
    let kx = (config.morph_kernel_w | 1).max(3);
    let ky = (config.morph_kernel_h | 1).max(1);
    let closed = close_rect(&sharp, kx, ky);

    let level = otsu_level(gray);
    let otsu = threshold(gray, level, ThresholdType::Binary);
    let otsu_inv = threshold(gray, level, ThresholdType::BinaryInverted);
    let adaptive = imageproc::contrast::adaptive_threshold(gray, 5);

    vec![
        ("gray", gray.clone()),
        ("enhanced", enhanced),
        ("sharp", sharp),
        ("closed", closed),
        ("otsu", otsu),
        ("otsu-inv", otsu_inv),
        ("adaptive", adaptive),
    ]
}

/// Contrast-limited adaptive histogram equalization.
///
/// Equalizes each `tile`×`tile` block with its histogram clipped at
/// `clip_limit` times the uniform bin height, which lifts local contrast
/// without blowing out noise the way plain equalization does.
pub fn clahe(image: &GrayImage, clip_limit: f32, tile: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let tile = tile.max(1);

    let mut result = GrayImage::new(width, height);

    let mut ty = 0;
    while ty < height {
        let y_end = (ty + tile).min(height);
        let mut tx = 0;
        while tx < width {
            let x_end = (tx + tile).min(width);

            let mut histogram = [0u32; 256];
            for y in ty..y_end {
                for x in tx..x_end {
                    histogram[image.get_pixel(x, y).0[0] as usize] += 1;
                }
            }

            let tile_pixels = ((x_end - tx) * (y_end - ty)) as u32;
            let clip = ((tile_pixels as f32 * clip_limit) / 256.0).max(1.0) as u32;

            // Clip the histogram and spread the excess over all bins.
            let mut clipped = 0u32;
            for count in histogram.iter_mut() {
                if *count > clip {
                    clipped += *count - clip;
                    *count = clip;
                }
            }
            let redistribute = clipped / 256;
            for count in histogram.iter_mut() {
                *count += redistribute;
            }

            let mut cdf = 0u32;
            let mut lut = [0u8; 256];
            for (value, count) in histogram.iter().enumerate() {
                cdf += count;
                lut[value] = ((cdf as f32 / tile_pixels as f32) * 255.0) as u8;
            }

            for y in ty..y_end {
                for x in tx..x_end {
                    let v = image.get_pixel(x, y).0[0];
                    result.put_pixel(x, y, Luma([lut[v as usize]]));
                }
            }

            tx = x_end;
        }
        ty = y_end;
    }

    result
}

/// Unsharp masking: `sharp = image * (1 + amount) - blurred * amount`.
pub fn unsharp_mask(image: &GrayImage, amount: f32, sigma: f32) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let blurred = imageproc::filter::gaussian_blur_f32(image, sigma.max(0.1));

    let mut result = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let original = pixel.0[0] as f32;
        let blur = blurred.get_pixel(x, y).0[0] as f32;
        let value = (original * (1.0 + amount) - blur * amount).clamp(0.0, 255.0);
        result.put_pixel(x, y, Luma([value as u8]));
    }
    result
}

/// Grayscale morphological close with a rectangular kernel.
///
/// A wide flat kernel bridges the dark gaps between adjacent bars, which
/// helps linear symbologies survive slight defocus. Implemented as a
/// separable max filter followed by a separable min filter.
pub fn close_rect(image: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    let dilated = rect_filter(image, kernel_w, kernel_h, u8::max, 0);
    rect_filter(&dilated, kernel_w, kernel_h, u8::min, 255)
}

fn rect_filter(
    image: &GrayImage,
    kernel_w: u32,
    kernel_h: u32,
    fold: fn(u8, u8) -> u8,
    identity: u8,
) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let rx = (kernel_w / 2) as i64;
    let ry = (kernel_h / 2) as i64;

    // Horizontal pass
    let mut horizontal = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = identity;
            for dx in -rx..=rx {
                let sx = x as i64 + dx;
                if sx >= 0 && sx < width as i64 {
                    acc = fold(acc, image.get_pixel(sx as u32, y).0[0]);
                }
            }
            horizontal.put_pixel(x, y, Luma([acc]));
        }
    }

    // Vertical pass
    let mut result = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = identity;
            for dy in -ry..=ry {
                let sy = y as i64 + dy;
                if sy >= 0 && sy < height as i64 {
                    acc = fold(acc, horizontal.get_pixel(x, sy as u32).0[0]);
                }
            }
            result.put_pixel(x, y, Luma([acc]));
        }
    }

    result
}

/// Mean adaptive threshold: a pixel becomes white when it exceeds the mean
/// of its neighborhood minus `offset`.
pub fn adaptive_mean_threshold(image: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    // Integral image for O(1) window sums.
    let w = width as usize;
    let h = height as usize;
    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        for x in 0..w {
            let v = image.get_pixel(x as u32, y as u32).0[0] as u64;
            integral[(y + 1) * (w + 1) + (x + 1)] = v
                + integral[y * (w + 1) + (x + 1)]
                + integral[(y + 1) * (w + 1) + x]
                - integral[y * (w + 1) + x];
        }
    }

    let r = radius as i64;
    let mut result = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let x0 = (x as i64 - r).max(0) as usize;
            let y0 = (y as i64 - r).max(0) as usize;
            let x1 = ((x as i64 + r) as usize + 1).min(w);
            let y1 = ((y as i64 + r) as usize + 1).min(h);

            // Corner added before the subtractions so the running value
            // never dips below zero.
            let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                - integral[y0 * (w + 1) + x1]
                - integral[y1 * (w + 1) + x0];
            let area = ((x1 - x0) * (y1 - y0)) as u64;
            let mean = (sum / area) as i32;

            let value = image.get_pixel(x as u32, y as u32).0[0] as i32;
            let out = if value > mean - offset { 255 } else { 0 };
            result.put_pixel(x as u32, y as u32, Luma([out]));
        }
    }

    result
}

/// Resample an image by a uniform scale factor (Catmull-Rom)
pub fn scale_by(image: &GrayImage, factor: f32) -> GrayImage {
    let new_w = ((image.width() as f32 * factor) as u32).max(1);
    let new_h = ((image.height() as f32 * factor) as u32).max(1);
    imageops::resize(image, new_w, new_h, imageops::FilterType::CatmullRom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x + y) % 256) as u8]))
    }

    #[test]
    fn test_build_variants_order() {
        let gray = gradient(64, 32);
        let variants = build_variants(&gray, &EnhanceConfig::default());
        let names: Vec<_> = variants.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                "gray",
                "enhanced",
                "sharp",
                "closed",
                "otsu",
                "otsu-inv",
                "adaptive"
            ]
        );
        for (_, img) in &variants {
            assert_eq!(img.dimensions(), (64, 32));
        }
    }

    #[test]
    fn test_otsu_variants_are_binary_and_inverted() {
        let gray = gradient(32, 32);
        let variants = build_variants(&gray, &EnhanceConfig::default());
        let otsu = &variants[4].1;
        let inv = &variants[5].1;
        for (x, y, p) in otsu.enumerate_pixels() {
            assert!(p.0[0] == 0 || p.0[0] == 255);
            assert_eq!(inv.get_pixel(x, y).0[0], 255 - p.0[0]);
        }
    }

    #[test]
    fn test_clahe_preserves_dimensions() {
        let gray = gradient(50, 30);
        let out = clahe(&gray, 2.0, 8);
        assert_eq!(out.dimensions(), (50, 30));
    }

    #[test]
    fn test_unsharp_flat_image_unchanged() {
        let gray = GrayImage::from_pixel(16, 16, Luma([100]));
        let out = unsharp_mask(&gray, 1.4, 1.0);
        // Blur of a flat image equals the image, so unsharp is the identity
        // away from the borders (up to float rounding).
        let center = out.get_pixel(8, 8).0[0] as i32;
        assert!((center - 100).abs() <= 1, "got {center}");
    }

    #[test]
    fn test_close_bridges_thin_dark_gap() {
        let mut gray = GrayImage::from_pixel(21, 9, Luma([255]));
        for y in 0..9 {
            gray.put_pixel(10, y, Luma([0]));
        }
        let closed = close_rect(&gray, 5, 1);
        assert_eq!(closed.get_pixel(10, 4).0[0], 255);
    }

    #[test]
    fn test_adaptive_mean_uniform_image_is_white() {
        let gray = GrayImage::from_pixel(20, 20, Luma([128]));
        let out = adaptive_mean_threshold(&gray, 5, 10);
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_adaptive_mean_dark_text_on_light() {
        let mut gray = GrayImage::from_pixel(30, 30, Luma([200]));
        for x in 10..20 {
            gray.put_pixel(x, 15, Luma([20]));
        }
        let out = adaptive_mean_threshold(&gray, 5, 10);
        assert_eq!(out.get_pixel(15, 15).0[0], 0);
        assert_eq!(out.get_pixel(2, 2).0[0], 255);
    }

    #[test]
    fn test_scale_by() {
        let gray = gradient(40, 20);
        assert_eq!(scale_by(&gray, 2.0).dimensions(), (80, 40));
        assert_eq!(scale_by(&gray, 0.5).dimensions(), (20, 10));
    }
}
